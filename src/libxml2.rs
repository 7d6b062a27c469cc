//! Safe wrapper around the libxml2 XML Schema API.
//!
//! `config.xml` is checked against the `Config.xsd` shipped for its project
//! type and version. There is no mature pure Rust XSD validator, so the
//! in-process linter binds libxml2 directly; `quick-xml` only handles the
//! plain document mapping.
//!
//! Schemas are loaded from a file path (not from memory) so that relative
//! `xs:include` / `xs:import` locations resolve next to the schema.
//!
//! libxml2 initialisation is not thread-safe and happens once behind a
//! [`Once`]. Parsing a schema must not run concurrently; the validator only
//! ever lints one document per run, from a blocking task.

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Arc, Once};

use libc::{c_char, c_int, c_uint};

use crate::error::{LibXml2Error, LibXml2Result};

static LIBXML2_INIT: Once = Once::new();

#[repr(C)]
pub struct XmlSchema {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaValidCtxt {
    _private: [u8; 0],
}

#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();
    pub fn xmlInitGlobals();

    pub fn xmlSchemaNewParserCtxt(url: *const c_char) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaSetParserStructuredErrors(
        ctxt: *mut XmlSchemaParserCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut libc::c_void,
    );
    pub fn xmlSchemaParse(ctxt: *const XmlSchemaParserCtxt) -> *mut XmlSchema;
    pub fn xmlSchemaFreeParserCtxt(ctxt: *mut XmlSchemaParserCtxt);
    pub fn xmlSchemaFree(schema: *mut XmlSchema);

    pub fn xmlSchemaNewValidCtxt(schema: *const XmlSchema) -> *mut XmlSchemaValidCtxt;
    pub fn xmlSchemaFreeValidCtxt(ctxt: *mut XmlSchemaValidCtxt);
    pub fn xmlSchemaValidateFile(
        ctxt: *const XmlSchemaValidCtxt,
        file_name: *const c_char,
        options: c_uint,
    ) -> c_int;
    pub fn xmlSchemaSetValidStructuredErrors(
        ctxt: *mut XmlSchemaValidCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut libc::c_void,
    );
}

#[repr(C)]
pub struct xmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut libc::c_void,
    pub node: *mut libc::c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut libc::c_void, error: *mut xmlError)>;

/// Collects `"line N: message"` entries into the `Vec<String>` behind `user_data`
unsafe extern "C" fn structured_error_callback(user_data: *mut libc::c_void, error: *mut xmlError) {
    if user_data.is_null() || error.is_null() {
        return;
    }
    let errors = unsafe { &mut *(user_data as *mut Vec<String>) };

    let msg_ptr = unsafe { (*error).message };
    if msg_ptr.is_null() {
        return;
    }
    let message = unsafe { CStr::from_ptr(msg_ptr) }.to_string_lossy();
    let line = unsafe { (*error).line };
    if line > 0 {
        errors.push(format!("line {}: {}", line, message.trim()));
    } else {
        errors.push(message.trim().to_string());
    }
}

/// Owned, shareable parsed schema
#[derive(Debug, Clone)]
pub struct XmlSchemaPtr {
    inner: Arc<XmlSchemaInner>,
}

#[derive(Debug)]
struct XmlSchemaInner {
    ptr: *mut XmlSchema,
    _phantom: PhantomData<XmlSchema>,
}

// Parsed schemas are read-only during validation
unsafe impl Send for XmlSchemaInner {}
unsafe impl Sync for XmlSchemaInner {}

impl XmlSchemaPtr {
    /// # Safety
    ///
    /// `ptr` must come from `xmlSchemaParse` and must not be freed elsewhere.
    pub(crate) unsafe fn from_raw(ptr: *mut XmlSchema) -> LibXml2Result<Self> {
        if ptr.is_null() {
            return Err(LibXml2Error::SchemaParseFailed);
        }
        Ok(XmlSchemaPtr {
            inner: Arc::new(XmlSchemaInner {
                ptr,
                _phantom: PhantomData,
            }),
        })
    }

    pub(crate) fn as_ptr(&self) -> *const XmlSchema {
        self.inner.ptr
    }

    pub fn is_valid(&self) -> bool {
        !self.inner.ptr.is_null()
    }
}

impl Drop for XmlSchemaInner {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                xmlSchemaFree(self.ptr);
            }
            self.ptr = std::ptr::null_mut();
        }
    }
}

/// Outcome of validating one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid { error_count: i32, errors: Vec<String> },
    InternalError { code: i32 },
}

impl ValidationResult {
    /// 0 is valid, a positive code counts violations, negative is an internal failure
    pub fn from_code(code: c_int, errors: Vec<String>) -> Self {
        match code {
            0 => ValidationResult::Valid,
            n if n > 0 => ValidationResult::Invalid {
                error_count: n,
                errors,
            },
            n => ValidationResult::InternalError { code: n },
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

fn c_path(path: &Path) -> LibXml2Result<CString> {
    path.to_str()
        .and_then(|s| CString::new(s).ok())
        .ok_or_else(|| LibXml2Error::InvalidPath {
            path: path.to_path_buf(),
        })
}

pub struct LibXml2Wrapper {
    _phantom: PhantomData<()>,
}

impl LibXml2Wrapper {
    pub fn new() -> Self {
        LIBXML2_INIT.call_once(|| unsafe {
            xmlInitParser();
            xmlInitGlobals();
        });

        LibXml2Wrapper {
            _phantom: PhantomData,
        }
    }

    /// Parse an XSD file. Parser diagnostics are returned with the error.
    pub fn parse_schema_from_file(
        &self,
        schema_path: &Path,
    ) -> Result<XmlSchemaPtr, (LibXml2Error, Vec<String>)> {
        let url = c_path(schema_path).map_err(|e| (e, Vec::new()))?;
        let mut errors: Vec<String> = Vec::new();

        unsafe {
            let parser_ctxt = xmlSchemaNewParserCtxt(url.as_ptr());
            if parser_ctxt.is_null() {
                return Err((LibXml2Error::MemoryAllocation, errors));
            }

            xmlSchemaSetParserStructuredErrors(
                parser_ctxt,
                Some(structured_error_callback),
                &mut errors as *mut Vec<String> as *mut libc::c_void,
            );

            let schema_ptr = xmlSchemaParse(parser_ctxt);
            xmlSchemaFreeParserCtxt(parser_ctxt);

            XmlSchemaPtr::from_raw(schema_ptr).map_err(|e| (e, errors))
        }
    }

    /// Validate one XML file against a parsed schema
    pub fn validate_file(
        &self,
        schema: &XmlSchemaPtr,
        file_path: &Path,
    ) -> LibXml2Result<ValidationResult> {
        let path = c_path(file_path)?;

        unsafe {
            let valid_ctxt = xmlSchemaNewValidCtxt(schema.as_ptr());
            if valid_ctxt.is_null() {
                return Err(LibXml2Error::ValidationContextCreationFailed);
            }

            let mut errors: Vec<String> = Vec::new();
            xmlSchemaSetValidStructuredErrors(
                valid_ctxt,
                Some(structured_error_callback),
                &mut errors as *mut Vec<String> as *mut libc::c_void,
            );

            let code = xmlSchemaValidateFile(valid_ctxt, path.as_ptr(), 0);
            xmlSchemaFreeValidCtxt(valid_ctxt);

            match ValidationResult::from_code(code, errors) {
                ValidationResult::InternalError { code } => Err(LibXml2Error::ValidationFailed {
                    code,
                    file: file_path.to_path_buf(),
                }),
                result => Ok(result),
            }
        }
    }
}

impl Default for LibXml2Wrapper {
    fn default() -> Self {
        Self::new()
    }
}
