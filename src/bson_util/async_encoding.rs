use bson::Document;
use futures_util::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    error::Result,
    runtime::{AsyncLittleEndianRead, AsyncLittleEndianWrite},
};

/// Reads a single raw BSON document (length-prefixed) off of `reader`.
pub(crate) async fn decode_document<R: AsyncRead + Unpin + Send>(
    reader: &mut R,
) -> Result<Document> {
    let length = reader.read_i32().await?;

    let mut bytes = Vec::with_capacity(length as usize);
    bytes.extend_from_slice(&length.to_le_bytes());

    reader
        .take(length as u64 - 4)
        .read_to_end(&mut bytes)
        .await?;

    Ok(bson::from_slice(&bytes)?)
}

/// Writes `document` to `writer` as a single raw BSON document.
pub(crate) async fn encode_document<W: AsyncWrite + Unpin + Send>(
    writer: &mut W,
    document: &Document,
) -> Result<()> {
    let bytes = bson::to_vec(document)?;
    writer.write_all(&bytes).await?;
    Ok(())
}
