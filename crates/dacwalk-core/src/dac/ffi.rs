//! # Native Binding
//!
//! A [`DacChannel`] backed by a C ABI function table.
//!
//! The data-access component itself is a COM-style native library. A thin native shim
//! loads it for the right runtime version and exports one [`DacVtable`] plus an opaque
//! context pointer. This module turns that table into safe Rust calls.
//!
//! ## Callback trampolines
//!
//! Native traversals call back through a plain function pointer and a `user` pointer.
//! The `user` pointer is a [`CallbackScope`] living on the Rust stack of the
//! traversal call, holding the borrowed sink. It is valid for exactly the duration of
//! the native call. Native code must not retain it after returning.
//!
//! A panic inside a sink is caught at the trampoline (unwinding through native frames
//! is undefined behaviour), further callbacks are ignored, and the panic resumes once
//! the native call has returned.

use std::any::Any;
use std::ffi::CStr;
use std::panic::{self, AssertUnwindSafe};

use libc::{c_char, c_int, c_void};

use super::{DacChannel, RawHandle, RawStackRoot, RawStaticRoot, RequestError, RootTraversal};
use crate::error::{DacError, Result};
use crate::types::Address;

/// Issue one request. Returns zero (or a positive success code) on success.
pub type RequestFn = unsafe extern "C" fn(
    context: *mut c_void,
    request: u32,
    input_len: u32,
    input: *const u8,
    output_len: u32,
    output: *mut u8,
) -> c_int;

/// Receives one stack root
pub type StackRootCallback = unsafe extern "C" fn(user: *mut c_void, root: *const NativeStackRoot);
/// Receives one static root
pub type StaticRootCallback = unsafe extern "C" fn(user: *mut c_void, root: *const NativeStaticRoot);
/// Receives one handle
pub type HandleCallback = unsafe extern "C" fn(user: *mut c_void, handle: *const NativeHandle);

/// Walk one thread's stack
pub type TraverseStackRootsFn = unsafe extern "C" fn(
    context: *mut c_void,
    thread: u64,
    cpu_context: *mut u8,
    cpu_context_len: u32,
    callback: StackRootCallback,
    user: *mut c_void,
) -> c_int;

/// Walk every static root
pub type TraverseStaticRootsFn = unsafe extern "C" fn(
    context: *mut c_void,
    resolve_names: c_int,
    callback: StaticRootCallback,
    user: *mut c_void,
) -> c_int;

/// Walk the handle table
pub type TraverseHandleTableFn =
    unsafe extern "C" fn(context: *mut c_void, extended: c_int, callback: HandleCallback, user: *mut c_void) -> c_int;

/// Function table exported by the native shim
#[repr(C)]
pub struct DacVtable
{
    /// `size_of::<DacVtable>()` as compiled by the shim
    pub size: u32,
    /// The request primitive (required)
    pub request: Option<RequestFn>,
    /// Stack root traversal
    pub traverse_stack_roots: Option<TraverseStackRootsFn>,
    /// Static root traversal
    pub traverse_static_roots: Option<TraverseStaticRootsFn>,
    /// Handle table traversal
    pub traverse_handle_table: Option<TraverseHandleTableFn>,
}

/// Stack root flag: interior pointer
pub const ROOT_FLAG_INTERIOR: u32 = 0x1;
/// Stack root flag: pinned
pub const ROOT_FLAG_PINNED: u32 = 0x2;

/// Stack root as passed to [`StackRootCallback`]
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NativeStackRoot
{
    /// Stack slot address
    pub address: u64,
    /// Referenced object
    pub object: u64,
    /// Object type handle
    pub type_handle: u64,
    /// `ROOT_FLAG_*` bits
    pub flags: u32,
    /// Reserved, zero
    pub reserved: u32,
}

/// Static root as passed to [`StaticRootCallback`]
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NativeStaticRoot
{
    /// Static storage address
    pub address: u64,
    /// Referenced object
    pub object: u64,
    /// Object type handle
    pub type_handle: u64,
    /// Owning app domain
    pub app_domain: u64,
    /// Nul-terminated name, or null. Only valid during the callback.
    pub name: *const c_char,
}

/// Handle as passed to [`HandleCallback`]
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NativeHandle
{
    /// Handle address
    pub address: u64,
    /// Referenced object
    pub object: u64,
    /// Object type handle
    pub type_handle: u64,
    /// Dependent handle secondary (extended data only)
    pub secondary: u64,
    /// Owning app domain
    pub app_domain: u64,
    /// Runtime handle type
    pub kind: u32,
    /// Reference count
    pub ref_count: u32,
}

/// Conversion from a callback argument to the Rust-side item
trait NativeItem
{
    type Item;

    /// ## Safety
    ///
    /// Any pointers inside `self` must be valid for the duration of the call.
    unsafe fn to_item(&self) -> Self::Item;
}

impl NativeItem for NativeStackRoot
{
    type Item = RawStackRoot;

    unsafe fn to_item(&self) -> RawStackRoot
    {
        RawStackRoot {
            address: Address::new(self.address),
            object: Address::new(self.object),
            type_handle: Address::new(self.type_handle),
            is_interior: self.flags & ROOT_FLAG_INTERIOR != 0,
            is_pinned: self.flags & ROOT_FLAG_PINNED != 0,
        }
    }
}

impl NativeItem for NativeStaticRoot
{
    type Item = RawStaticRoot;

    unsafe fn to_item(&self) -> RawStaticRoot
    {
        let name = if self.name.is_null() {
            None
        } else {
            // SAFETY: the native side guarantees a nul-terminated string for the callback's duration
            Some(unsafe { CStr::from_ptr(self.name) }.to_string_lossy().into_owned())
        };
        RawStaticRoot {
            address: Address::new(self.address),
            object: Address::new(self.object),
            type_handle: Address::new(self.type_handle),
            app_domain: Address::new(self.app_domain),
            name,
        }
    }
}

impl NativeItem for NativeHandle
{
    type Item = RawHandle;

    unsafe fn to_item(&self) -> RawHandle
    {
        RawHandle {
            address: Address::new(self.address),
            object: Address::new(self.object),
            type_handle: Address::new(self.type_handle),
            kind: self.kind,
            ref_count: self.ref_count,
            secondary: Address::new(self.secondary),
            app_domain: Address::new(self.app_domain),
        }
    }
}

/// Borrowed sink plus any panic it raised, for the duration of one native call
struct CallbackScope<'a, T>
{
    sink: &'a mut dyn FnMut(T),
    panic: Option<Box<dyn Any + Send + 'static>>,
}

impl<'a, T> CallbackScope<'a, T>
{
    fn new(sink: &'a mut dyn FnMut(T)) -> Self
    {
        Self { sink, panic: None }
    }

    fn as_user(&mut self) -> *mut c_void
    {
        (self as *mut Self).cast()
    }

    /// Re-raise a panic caught during the call
    fn finish(self)
    {
        if let Some(payload) = self.panic {
            panic::resume_unwind(payload);
        }
    }
}

unsafe extern "C" fn forward<N: NativeItem>(user: *mut c_void, item: *const N)
{
    if user.is_null() || item.is_null() {
        return;
    }
    // SAFETY: `user` is the CallbackScope created by the traversal that is still on the stack
    let scope = unsafe { &mut *user.cast::<CallbackScope<'_, N::Item>>() };
    if scope.panic.is_some() {
        return;
    }
    // SAFETY: the native side passes a valid item for the duration of the callback
    let value = unsafe { (*item).to_item() };
    let sink = &mut *scope.sink;
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| sink(value))) {
        scope.panic = Some(payload);
    }
}

fn check(request: u32, status: c_int) -> std::result::Result<(), RequestError>
{
    if status < 0 {
        Err(RequestError { request, status })
    } else {
        Ok(())
    }
}

/// Pseudo request ids used in [`RequestError`] for failed traversals
const TRAVERSE_STACK_ID: u32 = 0xffff_0001;
const TRAVERSE_STATICS_ID: u32 = 0xffff_0002;
const TRAVERSE_HANDLES_ID: u32 = 0xffff_0003;
/// Status reported when a buffer cannot be described to the native side
const E_INVALIDARG: c_int = 0x8007_0057_u32 as c_int;

/// A data-access component reached through a native [`DacVtable`]
#[derive(Debug)]
pub struct NativeDac
{
    vtable: *const DacVtable,
    context: *mut c_void,
}

impl NativeDac
{
    /// Wrap a native function table
    ///
    /// ## Errors
    ///
    /// - `MissingInterface`: The table is null, too small, or lacks the request function
    ///
    /// ## Safety
    ///
    /// `vtable` must point to a `DacVtable` and, together with `context`, stay valid
    /// for the lifetime of the returned value. The functions must follow the
    /// contracts documented on their types.
    pub unsafe fn from_raw(vtable: *const DacVtable, context: *mut c_void) -> Result<Self>
    {
        if vtable.is_null() {
            return Err(DacError::MissingInterface("request"));
        }
        // SAFETY: caller guarantees a valid table
        let table = unsafe { &*vtable };
        if (table.size as usize) < std::mem::size_of::<DacVtable>() || table.request.is_none() {
            return Err(DacError::MissingInterface("request"));
        }
        Ok(Self { vtable, context })
    }

    fn table(&self) -> &DacVtable
    {
        // SAFETY: validated in from_raw and kept alive by the caller's contract
        unsafe { &*self.vtable }
    }
}

fn buffer_len(request: u32, len: usize) -> std::result::Result<u32, RequestError>
{
    u32::try_from(len).map_err(|_| RequestError {
        request,
        status: E_INVALIDARG,
    })
}

impl DacChannel for NativeDac
{
    fn request(&self, request: u32, input: Option<&[u8]>, output: &mut [u8]) -> std::result::Result<(), RequestError>
    {
        let Some(request_fn) = self.table().request else {
            return Err(RequestError {
                request,
                status: E_INVALIDARG,
            });
        };
        let (input_ptr, input_len) = match input {
            Some(bytes) => (bytes.as_ptr(), buffer_len(request, bytes.len())?),
            None => (std::ptr::null(), 0),
        };
        let output_len = buffer_len(request, output.len())?;
        // SAFETY: buffers are valid for the advertised lengths for the whole call
        let status =
            unsafe { request_fn(self.context, request, input_len, input_ptr, output_len, output.as_mut_ptr()) };
        check(request, status)
    }

    fn root_traversal(&self) -> Option<&dyn RootTraversal>
    {
        let table = self.table();
        let complete = table.traverse_stack_roots.is_some()
            && table.traverse_static_roots.is_some()
            && table.traverse_handle_table.is_some();
        if complete {
            Some(self)
        } else {
            None
        }
    }
}

impl RootTraversal for NativeDac
{
    fn traverse_stack_roots(
        &self,
        thread: Address,
        context: &mut [u8],
        sink: &mut dyn FnMut(RawStackRoot),
    ) -> std::result::Result<(), RequestError>
    {
        let Some(traverse) = self.table().traverse_stack_roots else {
            return Err(RequestError {
                request: TRAVERSE_STACK_ID,
                status: E_INVALIDARG,
            });
        };
        let context_len = buffer_len(TRAVERSE_STACK_ID, context.len())?;
        let mut scope = CallbackScope::new(sink);
        // SAFETY: `scope` outlives the call; the context buffer is valid for `context_len` bytes
        let status = unsafe {
            traverse(
                self.context,
                thread.value(),
                context.as_mut_ptr(),
                context_len,
                forward::<NativeStackRoot>,
                scope.as_user(),
            )
        };
        scope.finish();
        check(TRAVERSE_STACK_ID, status)
    }

    fn traverse_static_roots(
        &self,
        resolve_names: bool,
        sink: &mut dyn FnMut(RawStaticRoot),
    ) -> std::result::Result<(), RequestError>
    {
        let Some(traverse) = self.table().traverse_static_roots else {
            return Err(RequestError {
                request: TRAVERSE_STATICS_ID,
                status: E_INVALIDARG,
            });
        };
        let mut scope = CallbackScope::new(sink);
        // SAFETY: `scope` outlives the call
        let status = unsafe {
            traverse(
                self.context,
                c_int::from(resolve_names),
                forward::<NativeStaticRoot>,
                scope.as_user(),
            )
        };
        scope.finish();
        check(TRAVERSE_STATICS_ID, status)
    }

    fn traverse_handle_table(
        &self,
        extended: bool,
        sink: &mut dyn FnMut(RawHandle),
    ) -> std::result::Result<(), RequestError>
    {
        let Some(traverse) = self.table().traverse_handle_table else {
            return Err(RequestError {
                request: TRAVERSE_HANDLES_ID,
                status: E_INVALIDARG,
            });
        };
        let mut scope = CallbackScope::new(sink);
        // SAFETY: `scope` outlives the call
        let status = unsafe {
            traverse(
                self.context,
                c_int::from(extended),
                forward::<NativeHandle>,
                scope.as_user(),
            )
        };
        scope.finish();
        check(TRAVERSE_HANDLES_ID, status)
    }
}
