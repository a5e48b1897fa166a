// SPDX-License-Identifier: AGPL-3.0-or-later
//! C FFI exports for non-Rust hosts
//!
//! A host drives an editor through an opaque handle. Stamps are requested
//! through a C callback that answers with JSON: `null` to decline, or
//! `{"label": ..., "value": ...}`.

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;

use serde_json::Value;
use tracing::warn;

use crate::ast::Stamp;
use crate::editor::Editor;
use crate::traits::{EditorError, LineOptions, StampContext, StampHost, StampTrigger};

/// Stamp request callback. The returned string stays owned by the host and
/// must remain valid until the callback is called again. Null declines.
pub type StampCallback =
    unsafe extern "C" fn(trigger: FfiTrigger, user_data: *mut c_void) -> *const c_char;

/// Opaque handle to an editor
pub struct EditorHandle {
    editor: Editor,
}

/// Result code for FFI operations
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiResult {
    Success = 0,
    InvalidInput = 1,
    InvariantViolation = 2,
    HostContractViolation = 3,
    NullPointer = 4,
    Utf8Error = 5,
}

impl From<&EditorError> for FfiResult {
    fn from(err: &EditorError) -> Self {
        match err {
            EditorError::InvalidArgument(_) | EditorError::Serialization(_) => Self::InvalidInput,
            EditorError::HostCallbackContractViolation(_) => Self::HostContractViolation,
            EditorError::StructuralInvariantViolation(_)
            | EditorError::NodeNotFound(_)
            | EditorError::InvalidOperation(_) => Self::InvariantViolation,
        }
    }
}

/// What made the editor ask for a stamp
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiTrigger {
    Break = 0,
    FirstCharacter = 1,
}

impl From<StampTrigger> for FfiTrigger {
    fn from(trigger: StampTrigger) -> Self {
        match trigger {
            StampTrigger::Break => Self::Break,
            StampTrigger::FirstCharacter => Self::FirstCharacter,
        }
    }
}

struct CallbackHost {
    callback: StampCallback,
    user_data: *mut c_void,
}

impl StampHost for CallbackHost {
    fn on_stamp_insert(&self, context: &StampContext) -> Option<Stamp> {
        // SAFETY: the host vouched for the callback and user data when it
        // created the editor
        let reply = unsafe { (self.callback)(context.trigger.into(), self.user_data) };
        if reply.is_null() {
            return None;
        }
        // SAFETY: non-null replies are NUL-terminated strings owned by the host
        let reply = unsafe { CStr::from_ptr(reply) }.to_string_lossy();
        let parsed = serde_json::from_str::<Value>(&reply)
            .map_err(|err| EditorError::HostCallbackContractViolation(err.to_string()))
            .and_then(Stamp::from_host_value);
        match parsed {
            Ok(stamp) => stamp,
            Err(err) => {
                warn!(error = %err, "ignoring stamp reply");
                None
            }
        }
    }
}

/// Create an editor. `callback` may be null for an editor that never
/// stamps.
///
/// # Safety
/// - `callback`, when present, must be safe to call with `user_data` for
///   the lifetime of the editor
#[no_mangle]
pub unsafe extern "C" fn notestamp_editor_new(
    callback: Option<StampCallback>,
    user_data: *mut c_void,
) -> *mut EditorHandle {
    let editor = match callback {
        Some(callback) => Editor::new(CallbackHost {
            callback,
            user_data,
        }),
        None => Editor::default(),
    };
    Box::into_raw(Box::new(EditorHandle { editor }))
}

/// Free an editor handle
///
/// # Safety
/// - `handle` must be a valid editor handle or null
#[no_mangle]
pub unsafe extern "C" fn notestamp_editor_free(handle: *mut EditorHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

unsafe fn read_str<'a>(s: *const c_char) -> Result<&'a str, FfiResult> {
    if s.is_null() {
        return Err(FfiResult::NullPointer);
    }
    CStr::from_ptr(s).to_str().map_err(|_| FfiResult::Utf8Error)
}

unsafe fn run(
    handle: *mut EditorHandle,
    command: impl FnOnce(&mut Editor) -> crate::Result<()>,
) -> FfiResult {
    let Some(handle) = handle.as_mut() else {
        return FfiResult::NullPointer;
    };
    match command(&mut handle.editor) {
        Ok(()) => FfiResult::Success,
        Err(err) => FfiResult::from(&err),
    }
}

unsafe fn write_string(output: String, out: *mut *mut c_char) -> FfiResult {
    match CString::new(output) {
        Ok(s) => {
            *out = s.into_raw();
            FfiResult::Success
        }
        Err(_) => FfiResult::InvalidInput,
    }
}

/// Replace the document with plain text
///
/// # Safety
/// - `handle` must be a valid editor handle
/// - `text` must be a valid null-terminated UTF-8 string
#[no_mangle]
pub unsafe extern "C" fn notestamp_set_text(
    handle: *mut EditorHandle,
    text: *const c_char,
) -> FfiResult {
    let text = match read_str(text) {
        Ok(text) => text,
        Err(code) => return code,
    };
    run(handle, |editor| editor.set_text_content(text))
}

/// Replace the document with a JSON node list
///
/// # Safety
/// - `handle` must be a valid editor handle
/// - `json` must be a valid null-terminated UTF-8 string
#[no_mangle]
pub unsafe extern "C" fn notestamp_set_children_json(
    handle: *mut EditorHandle,
    json: *const c_char,
) -> FfiResult {
    let json = match read_str(json) {
        Ok(json) => json,
        Err(code) => return code,
    };
    run(handle, |editor| editor.set_children_json(json))
}

/// Type text at the selection
///
/// # Safety
/// - `handle` must be a valid editor handle
/// - `text` must be a valid null-terminated UTF-8 string
#[no_mangle]
pub unsafe extern "C" fn notestamp_insert_text(
    handle: *mut EditorHandle,
    text: *const c_char,
) -> FfiResult {
    let text = match read_str(text) {
        Ok(text) => text,
        Err(code) => return code,
    };
    run(handle, |editor| editor.insert_text(text))
}

/// # Safety
/// - `handle` must be a valid editor handle
#[no_mangle]
pub unsafe extern "C" fn notestamp_insert_break(handle: *mut EditorHandle) -> FfiResult {
    run(handle, Editor::insert_break)
}

/// # Safety
/// - `handle` must be a valid editor handle
#[no_mangle]
pub unsafe extern "C" fn notestamp_delete_backward(handle: *mut EditorHandle) -> FfiResult {
    run(handle, Editor::delete_backward)
}

/// Plain text of the document; free with `notestamp_free_string`
///
/// # Safety
/// - `handle` must be a valid editor handle
/// - `out_text` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn notestamp_text_content(
    handle: *const EditorHandle,
    with_stamps: bool,
    out_text: *mut *mut c_char,
) -> FfiResult {
    let Some(handle) = handle.as_ref() else {
        return FfiResult::NullPointer;
    };
    if out_text.is_null() {
        return FfiResult::NullPointer;
    }
    let options = LineOptions { with_stamps };
    write_string(handle.editor.text_content(&options), out_text)
}

/// Document as a JSON node list; free with `notestamp_free_string`
///
/// # Safety
/// - `handle` must be a valid editor handle
/// - `out_json` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn notestamp_children_json(
    handle: *const EditorHandle,
    out_json: *mut *mut c_char,
) -> FfiResult {
    let Some(handle) = handle.as_ref() else {
        return FfiResult::NullPointer;
    };
    if out_json.is_null() {
        return FfiResult::NullPointer;
    }
    match handle.editor.children_json() {
        Ok(json) => write_string(json, out_json),
        Err(err) => FfiResult::from(&err),
    }
}

/// Number of batches that changed the document
///
/// # Safety
/// - `handle` must be a valid editor handle or null
#[no_mangle]
pub unsafe extern "C" fn notestamp_version(handle: *const EditorHandle) -> u64 {
    handle.as_ref().map_or(0, |handle| handle.editor.version())
}

/// Free a string allocated by the library
///
/// # Safety
/// - `s` must be a valid string from this library or null
#[no_mangle]
pub unsafe extern "C" fn notestamp_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    unsafe extern "C" fn stamp_twelve(_trigger: FfiTrigger, _user_data: *mut c_void) -> *const c_char {
        static REPLY: &[u8] = b"{\"label\":\"00:12\",\"value\":12}\0";
        REPLY.as_ptr() as *const c_char
    }

    unsafe extern "C" fn broken_reply(_trigger: FfiTrigger, _user_data: *mut c_void) -> *const c_char {
        static REPLY: &[u8] = b"[1,2]\0";
        REPLY.as_ptr() as *const c_char
    }

    unsafe fn text_of(handle: *const EditorHandle, with_stamps: bool) -> String {
        let mut out: *mut c_char = ptr::null_mut();
        assert_eq!(notestamp_text_content(handle, with_stamps, &mut out), FfiResult::Success);
        let text = CStr::from_ptr(out).to_str().unwrap().to_owned();
        notestamp_free_string(out);
        text
    }

    #[test]
    fn test_callback_stamps_first_character() {
        let text = CString::new("hi").unwrap();
        unsafe {
            let handle = notestamp_editor_new(Some(stamp_twelve), ptr::null_mut());
            assert_eq!(notestamp_insert_text(handle, text.as_ptr()), FfiResult::Success);
            assert_eq!(text_of(handle, true), "[00:12] hi\n");
            assert_eq!(notestamp_version(handle), 1);
            notestamp_editor_free(handle);
        }
    }

    #[test]
    fn test_broken_reply_is_declined() {
        let text = CString::new("hi").unwrap();
        unsafe {
            let handle = notestamp_editor_new(Some(broken_reply), ptr::null_mut());
            assert_eq!(notestamp_insert_text(handle, text.as_ptr()), FfiResult::Success);
            assert_eq!(text_of(handle, true), "hi\n");
            notestamp_editor_free(handle);
        }
    }

    #[test]
    fn test_bad_json_keeps_document() {
        let json = CString::new("{").unwrap();
        unsafe {
            let handle = notestamp_editor_new(None, ptr::null_mut());
            assert_eq!(
                notestamp_set_children_json(handle, json.as_ptr()),
                FfiResult::InvalidInput
            );
            let mut out: *mut c_char = ptr::null_mut();
            assert_eq!(notestamp_children_json(handle, &mut out), FfiResult::Success);
            assert_eq!(
                CStr::from_ptr(out).to_str().unwrap(),
                r#"[{"type":"paragraph","children":[{"text":""}]}]"#
            );
            notestamp_free_string(out);
            notestamp_editor_free(handle);
        }
    }

    #[test]
    fn test_null_pointers() {
        unsafe {
            assert_eq!(notestamp_insert_break(ptr::null_mut()), FfiResult::NullPointer);
            assert_eq!(notestamp_version(ptr::null()), 0);
            let handle = notestamp_editor_new(None, ptr::null_mut());
            assert_eq!(notestamp_set_text(handle, ptr::null()), FfiResult::NullPointer);
            notestamp_editor_free(handle);
        }
    }
}
