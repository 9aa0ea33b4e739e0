#[cfg(feature = "bson-3")]
pub(crate) trait RawDocumentBufExt {
    fn append_ref<'a>(
        &mut self,
        key: impl AsRef<str>,
        value: impl Into<crate::bson::raw::RawBsonRef<'a>>,
    );
}

#[cfg(feature = "bson-3")]
impl RawDocumentBufExt for crate::bson::RawDocumentBuf {
    fn append_ref<'a>(
        &mut self,
        key: impl AsRef<str>,
        value: impl Into<crate::bson::raw::RawBsonRef<'a>>,
    ) {
        self.append(key, value)
    }
}

#[cfg(feature = "bson-3")]
pub(crate) use crate::bson::error::Result as RawResult;

#[cfg(not(feature = "bson-3"))]
pub(crate) use crate::bson::raw::Result as RawResult;

#[cfg(feature = "bson-3")]
pub(crate) use crate::bson::error::Error as RawError;

#[cfg(not(feature = "bson-3"))]
pub(crate) use crate::bson::raw::Error as RawError;

/// A document/command key. bson 3.x validates keys as C-strings (no embedded NUL) at the type
/// level; bson 2.x takes plain `&str`, so the pre-3.x shim is just that.
#[cfg(feature = "bson-3")]
pub(crate) type CStr = &'static crate::bson::raw::CStr;

#[cfg(not(feature = "bson-3"))]
pub(crate) type CStr = &'static str;

#[cfg(feature = "bson-3")]
pub(crate) fn cstr_to_str(s: CStr) -> &'static str {
    s.as_str()
}

#[cfg(not(feature = "bson-3"))]
pub(crate) fn cstr_to_str(s: CStr) -> &'static str {
    s
}

#[cfg(feature = "bson-3")]
pub(crate) use crate::bson::cstr;

#[cfg(not(feature = "bson-3"))]
macro_rules! cstr {
    ($s:literal) => {
        $s
    };
}
#[cfg(not(feature = "bson-3"))]
pub(crate) use cstr;

/// Deserializes a BSON document into `T`, smoothing over the bson 2.x/3.x API rename
/// (`from_document`/`from_slice` vs `deserialize_from_document`/`deserialize_from_slice`).
#[cfg(feature = "bson-3")]
pub(crate) fn deserialize_from_document<T: serde::de::DeserializeOwned>(
    doc: crate::bson::Document,
) -> RawResult<T> {
    crate::bson::deserialize_from_document(doc)
}

#[cfg(not(feature = "bson-3"))]
pub(crate) fn deserialize_from_document<T: serde::de::DeserializeOwned>(
    doc: crate::bson::Document,
) -> RawResult<T> {
    crate::bson::from_document(doc)
}

#[cfg(feature = "bson-3")]
pub(crate) fn deserialize_from_slice<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> RawResult<T> {
    crate::bson::deserialize_from_slice(bytes)
}

#[cfg(not(feature = "bson-3"))]
pub(crate) fn deserialize_from_slice<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> RawResult<T> {
    crate::bson::from_slice(bytes)
}

/// Extension methods bson 3.x added natively to `Document`; kept as a shim trait under bson 2.x
/// so call sites can stay version-agnostic behind a single `use ... as _` import.
#[cfg(not(feature = "bson-3"))]
pub(crate) trait DocumentExt {
    fn to_raw_document_buf(&self) -> RawResult<crate::bson::RawDocumentBuf>;
}

#[cfg(not(feature = "bson-3"))]
impl DocumentExt for crate::bson::Document {
    fn to_raw_document_buf(&self) -> RawResult<crate::bson::RawDocumentBuf> {
        crate::bson::RawDocumentBuf::from_document(self)
    }
}
