use std::ffi::c_void;
use std::slice;

use circlink_abi::cl_bytes;

// Owns one native malloc allocation returned across the boundary; the
// matching free happens exactly once on drop, on every exit path.
pub(crate) struct NativeBuf {
    raw: cl_bytes,
}

impl NativeBuf {
    // The pointer must be a malloc allocation of raw.len bytes (or null,
    // treated as empty) that nothing else will free.
    pub(crate) unsafe fn adopt(raw: cl_bytes) -> Self {
        NativeBuf { raw }
    }

    pub(crate) fn to_vec(&self) -> Vec<u8> {
        if self.raw.is_empty() {
            return Vec::new();
        }
        unsafe { slice::from_raw_parts(self.raw.ptr, self.raw.len as usize) }.to_vec()
    }
}

impl Drop for NativeBuf {
    fn drop(&mut self) {
        if !self.raw.ptr.is_null() {
            unsafe { libc::free(self.raw.ptr as *mut c_void) };
        }
    }
}

// Consume an envelope's error buffer before trusting any other field.
// Always releases the allocation.
pub(crate) unsafe fn take_error(error: cl_bytes) -> Option<String> {
    let buf = NativeBuf::adopt(error);
    let bytes = buf.to_vec();
    if bytes.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    fn malloc_bytes(data: &[u8]) -> cl_bytes {
        unsafe {
            let p = libc::malloc(data.len()) as *mut u8;
            assert!(!p.is_null());
            p.copy_from(data.as_ptr(), data.len());
            cl_bytes {
                ptr: p,
                len: data.len() as u64,
            }
        }
    }

    #[test]
    fn adopt_copies_and_frees() {
        let raw = malloc_bytes(b"layered");
        let buf = unsafe { NativeBuf::adopt(raw) };
        assert_eq!(buf.to_vec(), b"layered");
    }

    #[test]
    fn null_buffer_is_empty() {
        let buf = unsafe {
            NativeBuf::adopt(cl_bytes {
                ptr: ptr::null_mut(),
                len: 0,
            })
        };
        assert!(buf.to_vec().is_empty());
    }

    #[test]
    fn take_error_empty_means_success() {
        assert_eq!(unsafe { take_error(cl_bytes::empty()) }, None);
    }

    #[test]
    fn take_error_preserves_message() {
        let raw = malloc_bytes(b"unknown config id: 7");
        assert_eq!(
            unsafe { take_error(raw) }.as_deref(),
            Some("unknown config id: 7")
        );
    }
}
