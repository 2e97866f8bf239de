//! FFI interface for C/C++ hosts
//!
//! Provides C-compatible functions for running listing searches over HTML
//! the host has already fetched. Configuration and results cross the
//! boundary as JSON.

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use serde::Serialize;

use crate::pipeline::search;
use crate::query::Query;
use crate::report::TracingReporter;
use crate::schema::VendorRegistry;

/// Result struct returned to the host
/// Both pointers are owned by Rust and must be freed via free_search_result
#[repr(C)]
pub struct SearchResultFFI {
    /// JSON-serialized result (null-terminated)
    pub json_ptr: *mut c_char,
    /// Error message if the call failed (null-terminated), or null on success
    pub error_ptr: *mut c_char,
}

/// Filter the listings on one search page.
///
/// # Arguments
/// * `html_ptr` - Pointer to HTML content (UTF-8, not necessarily null-terminated)
/// * `html_len` - Length of HTML content in bytes
/// * `page_url` - URL the HTML was loaded from, used to absolutise links
/// * `vendors_json` - `{ "<identifier>": {...vendor...} }` document
/// * `vendor_id` - Identifier of the vendor the page belongs to
/// * `query_json` - Query document
///
/// # Returns
/// SearchResultFFI whose json_ptr holds `{"price (low)", "price (mean)", "listings"}`
///
/// # Safety
/// - `html_ptr` must point to valid memory of at least `html_len` bytes
/// - the remaining pointers must be valid null-terminated C strings
/// - Caller must free the result via `free_search_result`
#[no_mangle]
pub unsafe extern "C" fn search_listings(
    html_ptr: *const c_char,
    html_len: usize,
    page_url: *const c_char,
    vendors_json: *const c_char,
    vendor_id: *const c_char,
    query_json: *const c_char,
) -> SearchResultFFI {
    let html = match read_html(html_ptr, html_len) {
        Ok(h) => h,
        Err(msg) => return make_error_result(msg),
    };
    let (page_url, vendors_json, vendor_id, query_json) = match (
        read_cstr(page_url, "page URL"),
        read_cstr(vendors_json, "vendors JSON"),
        read_cstr(vendor_id, "vendor identifier"),
        read_cstr(query_json, "query JSON"),
    ) {
        (Ok(a), Ok(b), Ok(c), Ok(d)) => (a, b, c, d),
        (Err(e), ..) | (_, Err(e), ..) | (_, _, Err(e), _) | (.., Err(e)) => {
            return make_error_result(&e)
        }
    };

    let registry = match VendorRegistry::from_json(vendors_json) {
        Ok(r) => r,
        Err(e) => return make_error_result(&e.to_string()),
    };
    let Some(vendor) = registry.find(vendor_id) else {
        return make_error_result(&format!(
            "No vendor with the given identifier, `{vendor_id}` was found"
        ));
    };
    let query = match Query::from_json(query_json) {
        Ok(q) => q,
        Err(e) => return make_error_result(&e.to_string()),
    };

    match search(vendor, &query, &html, page_url, &TracingReporter) {
        Ok(result) => make_json_result(&result),
        Err(e) => make_error_result(&e.to_string()),
    }
}

/// Build a vendor's search URL for a query term.
///
/// # Safety
/// All pointers must be valid null-terminated C strings.
/// Caller must free the result via `free_search_result`
#[no_mangle]
pub unsafe extern "C" fn build_search_url(
    vendors_json: *const c_char,
    vendor_id: *const c_char,
    term: *const c_char,
) -> SearchResultFFI {
    let (vendors_json, vendor_id, term) = match (
        read_cstr(vendors_json, "vendors JSON"),
        read_cstr(vendor_id, "vendor identifier"),
        read_cstr(term, "search term"),
    ) {
        (Ok(a), Ok(b), Ok(c)) => (a, b, c),
        (Err(e), ..) | (_, Err(e), _) | (.., Err(e)) => return make_error_result(&e),
    };

    let registry = match VendorRegistry::from_json(vendors_json) {
        Ok(r) => r,
        Err(e) => return make_error_result(&e.to_string()),
    };
    let Some(vendor) = registry.find(vendor_id) else {
        return make_error_result(&format!(
            "No vendor with the given identifier, `{vendor_id}` was found"
        ));
    };

    match vendor.search_url(term) {
        Ok(url) => make_json_result(&url.as_str()),
        Err(e) => make_error_result(&e.to_string()),
    }
}

/// Install a tracing subscriber honouring RUST_LOG.
/// Returns false if one was already installed.
#[no_mangle]
pub extern "C" fn listing_parser_init_logging() -> bool {
    crate::logging::init()
}

/// Free a SearchResultFFI returned by this module
///
/// # Safety
/// - `result` must have been returned by a function in this module
/// - Must only be called once per result
#[no_mangle]
pub unsafe extern "C" fn free_search_result(result: SearchResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

unsafe fn read_html(html_ptr: *const c_char, html_len: usize) -> Result<String, &'static str> {
    if html_ptr.is_null() || html_len == 0 {
        return Ok(String::new());
    }
    let slice = std::slice::from_raw_parts(html_ptr as *const u8, html_len);
    std::str::from_utf8(slice)
        .map(str::to_string)
        .map_err(|_| "Invalid UTF-8 in HTML content")
}

unsafe fn read_cstr<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, String> {
    if ptr.is_null() {
        return Err(format!("{what} is null"));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| format!("Invalid UTF-8 in {what}"))
}

fn make_json_result<T: Serialize>(value: &T) -> SearchResultFFI {
    match serde_json::to_string(value) {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => SearchResultFFI {
                json_ptr: cstr.into_raw(),
                error_ptr: ptr::null_mut(),
            },
            Err(_) => make_error_result("Result JSON contains null bytes"),
        },
        Err(e) => make_error_result(&format!("Failed to serialize result: {e}")),
    }
}

fn make_error_result(msg: &str) -> SearchResultFFI {
    let error_cstr = CString::new(msg).unwrap_or_else(|_| c"Unknown error".to_owned());
    SearchResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr: error_cstr.into_raw(),
    }
}
