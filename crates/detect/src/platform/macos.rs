//! macOS usage provider backed by the frontmost application.
//!
//! macOS has no usage-ranking service; the frontmost application is by
//! definition the most recently used one, so the trailing window is ignored.

use crate::provider::UsageRanking;
use crate::Result;
use std::time::Duration;

use objc::runtime::{Class, Object};
use objc::{msg_send, sel, sel_impl};

#[derive(Debug, Default, Clone, Copy)]
pub struct MacOSProvider;

impl MacOSProvider {
    pub fn new() -> Self {
        Self
    }
}

impl UsageRanking for MacOSProvider {
    fn most_recent_app(&self, _window: Duration) -> Result<Option<String>> {
        Ok(frontmost_bundle_id())
    }
}

/// Bundle id of the frontmost application via
/// `[[NSWorkspace sharedWorkspace] frontmostApplication]`.
fn frontmost_bundle_id() -> Option<String> {
    unsafe {
        let workspace_class = Class::get("NSWorkspace")?;

        let shared_workspace: *mut Object = msg_send![workspace_class, sharedWorkspace];
        if shared_workspace.is_null() {
            return None;
        }

        let frontmost_app: *mut Object = msg_send![shared_workspace, frontmostApplication];
        if frontmost_app.is_null() {
            return None;
        }

        let bundle_id_ns: *mut Object = msg_send![frontmost_app, bundleIdentifier];
        let bundle_id = nsstring_to_string(bundle_id_ns)?;

        if bundle_id.is_empty() {
            return None;
        }
        Some(bundle_id)
    }
}

/// Convert NSString to Rust String.
unsafe fn nsstring_to_string(nsstring: *mut Object) -> Option<String> {
    if nsstring.is_null() {
        return None;
    }

    let c_str: *const std::os::raw::c_char = msg_send![nsstring, UTF8String];
    if c_str.is_null() {
        return None;
    }

    let rust_str = std::ffi::CStr::from_ptr(c_str).to_str().ok()?;
    Some(rust_str.to_string())
}
