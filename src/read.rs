use bytes::{Buf, Bytes, BytesMut};
use futures_util::stream::{self, TryStreamExt};
use log::{debug, trace};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::io::{ReaderStream, StreamReader};

use std::marker::PhantomData;

use crate::container::LogOutput;
use crate::errors::Error;
use crate::transport::{decode_json, Body, BodyStream, Headers, Response};

const FRAME_HEADER_LEN: usize = 8;

/// How the body of a raw response is delimited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Framing {
    NoBody,
    Chunked,
    Length(usize),
    UntilClose,
    Unsupported(String),
    Missing,
}

impl Framing {
    pub(crate) fn from_head(status: u16, headers: &Headers) -> Result<Framing, Error> {
        // 1xx, 204 and 304 never carry a body, whatever the headers say
        if (100..200).contains(&status) || status == 204 || status == 304 {
            return Ok(Framing::NoBody);
        }
        if let Some(encoding) = headers.get("Transfer-Encoding") {
            if encoding.trim().eq_ignore_ascii_case("chunked") {
                return Ok(Framing::Chunked);
            }
            return Ok(Framing::Unsupported(encoding.trim().to_string()));
        }
        match headers.get("Content-Length") {
            Some(length) => Ok(Framing::Length(length.trim().parse()?)),
            None if is_raw_stream(headers) => Ok(Framing::UntilClose),
            None => Ok(Framing::Missing),
        }
    }
}

/// Parse a raw HTTP/1.1 response off a socket.
///
/// Resolves once the head has been read; the body keeps reading from `reader` as it is consumed.
pub(crate) async fn parse_response<R>(mut reader: R) -> Result<Response, Error>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(Error::malformed("connection closed before the status line"));
    }
    let status = parse_status_line(&line)?;

    let mut headers = Headers::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(Error::malformed("connection closed inside the response headers"));
        }
        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            break;
        }
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| Error::malformed(format!("invalid header line '{}'", header)))?;
        headers.append(name.trim(), value.trim());
    }

    let framing = Framing::from_head(status, &headers)?;
    debug!("Parsed raw response: status {}, framing {:?}", status, framing);

    let body = match framing {
        Framing::NoBody => Body::empty(),
        Framing::Chunked => Body::from_stream(chunked(reader)),
        Framing::Length(length) => Body::from_stream(fixed_length(reader, length)),
        Framing::UntilClose => Body::from_stream(ReaderStream::new(reader).map_err(Error::from)),
        Framing::Unsupported(encoding) => {
            Body::failed(Error::UnsupportedTransferEncoding { encoding })
        }
        Framing::Missing => Body::failed(Error::MissingTransferEncoding),
    };

    Ok(Response::new(status, headers, body))
}

/// Attached exec and container streams are sent unframed and end when the daemon closes the
/// connection.
fn is_raw_stream(headers: &Headers) -> bool {
    headers.get("Content-Type").is_some_and(|content_type| {
        let media_type = content_type.split(';').next().unwrap_or_default().trim();
        media_type.eq_ignore_ascii_case("application/vnd.docker.raw-stream")
            || media_type.eq_ignore_ascii_case("application/vnd.docker.multiplexed-stream")
    })
}

fn parse_status_line(line: &str) -> Result<u16, Error> {
    let mut parts = line.trim_end_matches(['\r', '\n']).splitn(3, ' ');
    match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => Ok(code.parse()?),
        _ => Err(Error::malformed(format!(
            "invalid status line '{}'",
            line.trim_end()
        ))),
    }
}

fn fixed_length<R>(mut reader: R, length: usize) -> impl futures_core::Stream<Item = Result<Bytes, Error>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    stream::once(async move {
        let mut buf = vec![0; length];
        reader.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    })
}

fn chunked<R>(reader: R) -> impl futures_core::Stream<Item = Result<Bytes, Error>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    stream::try_unfold(reader, |mut reader| async move {
        let mut line = String::new();
        loop {
            if reader.read_line(&mut line).await? == 0 {
                return Err(Error::malformed("connection closed inside a chunked body"));
            }
            if !line.trim().is_empty() {
                break;
            }
            line.clear();
        }

        // chunk extensions follow a ';'
        let size = line.trim().split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size, 16)
            .map_err(|_| Error::malformed(format!("invalid chunk size '{}'", size)))?;
        trace!("Reading chunk of {} bytes", size);

        if size == 0 {
            loop {
                line.clear();
                if reader.read_line(&mut line).await? == 0 || line.trim().is_empty() {
                    break;
                }
            }
            return Ok(None);
        }

        let mut chunk = vec![0; size];
        reader.read_exact(&mut chunk).await?;
        line.clear();
        reader.read_line(&mut line).await?;

        Ok(Some((Bytes::from(chunk), reader)))
    })
}

/// Decodes docker's multiplexed stream framing, or passes raw console output through when the
/// container runs with a TTY.
#[derive(Debug, Copy, Clone)]
pub(crate) struct LogOutputDecoder {
    tty: bool,
}

impl LogOutputDecoder {
    pub(crate) fn new(tty: bool) -> LogOutputDecoder {
        LogOutputDecoder { tty }
    }
}

impl Decoder for LogOutputDecoder {
    type Item = LogOutput;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.tty {
            if src.is_empty() {
                return Ok(None);
            }
            return Ok(Some(LogOutput::Console {
                message: src.split().freeze(),
            }));
        }

        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let stream_type = src[0];
        if src[1..4] != [0, 0, 0] {
            return Err(Error::malformed(format!(
                "invalid stream frame header {:?}",
                &src[..FRAME_HEADER_LEN]
            )));
        }
        let length = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;
        if src.len() < FRAME_HEADER_LEN + length {
            src.reserve(FRAME_HEADER_LEN + length - src.len());
            return Ok(None);
        }

        src.advance(FRAME_HEADER_LEN);
        let message = src.split_to(length).freeze();
        trace!("Decoded stream frame of type {} with {} bytes", stream_type, length);

        match stream_type {
            0 => Ok(Some(LogOutput::StdIn { message })),
            1 => Ok(Some(LogOutput::StdOut { message })),
            2 => Ok(Some(LogOutput::StdErr { message })),
            other => Err(Error::malformed(format!("unknown stream type {}", other))),
        }
    }
}

/// Split a fully buffered log body into its frames.
pub(crate) fn demultiplex(bytes: Bytes, tty: bool) -> Result<Vec<LogOutput>, Error> {
    let mut decoder = LogOutputDecoder::new(tty);
    let mut src = BytesMut::from(&bytes[..]);
    let mut frames = Vec::new();
    while let Some(frame) = decoder.decode(&mut src)? {
        frames.push(frame);
    }
    if !src.is_empty() {
        return Err(Error::malformed(format!(
            "{} bytes of an incomplete stream frame",
            src.len()
        )));
    }
    Ok(frames)
}

/// Decodes one JSON value per line, as sent by the streaming endpoints.
#[derive(Debug)]
pub(crate) struct JsonLineDecoder<T> {
    ty: PhantomData<T>,
}

impl<T> JsonLineDecoder<T> {
    #[inline]
    pub(crate) fn new() -> JsonLineDecoder<T> {
        JsonLineDecoder { ty: PhantomData }
    }
}

impl<T> Decoder for JsonLineDecoder<T>
where
    T: DeserializeOwned,
{
    type Item = T;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(pos) = src.iter().position(|b| *b == b'\n') else {
                return Ok(None);
            };
            let line = src.split_to(pos + 1);
            let line = line[..pos].trim_ascii();
            if line.is_empty() {
                continue;
            }
            trace!("Decoding JSON line from stream: {}", String::from_utf8_lossy(line));
            return decode_json(line).map(Some);
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }
        let rest = src.split();
        let line = rest.trim_ascii();
        if line.is_empty() {
            Ok(None)
        } else {
            decode_json(line).map(Some)
        }
    }
}

/// Run a streaming body through a decoder.
pub(crate) fn decode_stream<D>(body: BodyStream, decoder: D) -> FramedRead<StreamReader<BodyIo, Bytes>, D>
where
    D: Decoder,
{
    let into_io: fn(Error) -> std::io::Error = std::io::Error::from;
    FramedRead::new(StreamReader::new(body.map_err(into_io)), decoder)
}

/// Read a progress stream to its end, failing on the first error the daemon reports in it.
pub(crate) async fn consume_progress(body: BodyStream, context: &str) -> Result<(), Error> {
    let mut progress = decode_stream(body, JsonLineDecoder::<Value>::new());
    while let Some(update) = progress.try_next().await? {
        if let Some(error) = update.get("error").and_then(Value::as_str) {
            return Err(Error::DockerStreamError {
                error: error.to_string(),
            });
        }
        if let Some(status) = update.get("status").and_then(Value::as_str) {
            debug!("{}: {}", context, status);
        }
    }
    Ok(())
}

pub(crate) type BodyIo = futures_util::stream::MapErr<BodyStream, fn(Error) -> std::io::Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream::StreamExt;
    use std::io::Cursor;

    fn raw(response: &str) -> Cursor<Vec<u8>> {
        Cursor::new(response.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn parses_fixed_length_body() {
        let response = parse_response(raw(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 13\r\n\r\n{\"Id\":\"abc\"}\n",
        ))
        .await
        .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers().get("content-type"), Some("application/json"));
        assert_eq!(response.text().await.unwrap(), "{\"Id\":\"abc\"}\n");
    }

    #[tokio::test]
    async fn parses_chunked_body() {
        let response = parse_response(raw(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n7\r\nMozilla\r\nA\r\n Developer\r\n8\r\n Network\r\n0\r\n\r\n",
        ))
        .await
        .unwrap();

        assert_eq!(response.text().await.unwrap(), "Mozilla Developer Network");
    }

    // Chunk payloads are concatenated byte for byte. Without spaces inside the chunks the words
    // run together, unlike the prose rendering "Mozilla Developer Network" of this example.
    #[tokio::test]
    async fn parses_chunked_body_with_bare_newlines() {
        let response = parse_response(raw(
            "HTTP/1.1 200 OK\nTransfer-Encoding: chunked\n\n7\nMozilla\n9\nDeveloper\n7\nNetwork\n0\n\n",
        ))
        .await
        .unwrap();

        assert_eq!(response.text().await.unwrap(), "MozillaDeveloperNetwork");
    }

    #[tokio::test]
    async fn keeps_duplicate_headers_in_order() {
        let response = parse_response(raw(
            "HTTP/1.1 204 No Content\r\nWarning: one\r\nServer: Docker\r\nWarning: two\r\nContent-Length: 0\r\n\r\n",
        ))
        .await
        .unwrap();

        assert_eq!(response.status(), 204);
        assert_eq!(response.headers().get_all("Warning"), &["one", "two"]);
        assert_eq!(response.bytes().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn missing_framing_fails_on_body_access() {
        let response = parse_response(raw("HTTP/1.1 200 OK\r\nServer: Docker\r\n\r\nhello"))
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let err = response.text().await.unwrap_err();
        assert_eq!(err.to_string(), "Transfer-Encoding header is missing");
    }

    #[tokio::test]
    async fn bodiless_statuses_need_no_framing() {
        for head in [
            "HTTP/1.1 204 No Content\r\nApi-Version: 1.41\r\nServer: Docker\r\n\r\n",
            "HTTP/1.1 304 Not Modified\r\nServer: Docker\r\n\r\n",
        ] {
            let response = parse_response(raw(head)).await.unwrap();
            assert_eq!(response.bytes().await.unwrap().len(), 0);
        }
    }

    #[tokio::test]
    async fn raw_streams_are_read_until_close() {
        let mut raw_response =
            b"HTTP/1.1 200 OK\r\nContent-Type: application/vnd.docker.raw-stream\r\n\r\n".to_vec();
        raw_response.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 3]);
        raw_response.extend_from_slice(b"hi\n");

        let response = parse_response(Cursor::new(raw_response)).await.unwrap();
        let frames = demultiplex(response.bytes().await.unwrap(), false).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].to_string(), "hi\n");
    }

    #[tokio::test]
    async fn other_transfer_encodings_are_rejected() {
        let response = parse_response(raw(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: gzip\r\n\r\nhello",
        ))
        .await
        .unwrap();

        match response.bytes().await {
            Err(Error::UnsupportedTransferEncoding { encoding }) => assert_eq!(encoding, "gzip"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn rejects_garbage_status_line() {
        match parse_response(raw("SSH-2.0-OpenSSH\r\n\r\n")).await {
            Err(Error::MalformedResponse { .. }) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn decodes_a_single_frame() {
        let mut src = BytesMut::from(&[1u8, 0, 0, 0, 0, 0, 0, 5][..]);
        src.extend_from_slice(b"hello");

        let frame = LogOutputDecoder::new(false).decode(&mut src).unwrap().unwrap();
        assert_eq!(frame.to_string(), "hello");
        assert!(matches!(frame, LogOutput::StdOut { .. }));
        assert!(src.is_empty());
    }

    #[test]
    fn waits_for_a_complete_frame() {
        let mut src = BytesMut::from(&[2u8, 0, 0, 0, 0, 0, 0, 5, b'h', b'e'][..]);
        let mut decoder = LogOutputDecoder::new(false);
        assert!(decoder.decode(&mut src).unwrap().is_none());

        src.extend_from_slice(b"llo");
        let frame = decoder.decode(&mut src).unwrap().unwrap();
        assert!(matches!(frame, LogOutput::StdErr { .. }));
        assert_eq!(frame.into_bytes(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn demultiplexes_interleaved_streams() {
        let mut body = vec![1u8, 0, 0, 0, 0, 0, 0, 4];
        body.extend_from_slice(b"out\n");
        body.extend_from_slice(&[2, 0, 0, 0, 0, 0, 0, 4]);
        body.extend_from_slice(b"err\n");

        let frames = demultiplex(Bytes::from(body), false).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], LogOutput::StdOut { .. }));
        assert!(matches!(frames[1], LogOutput::StdErr { .. }));
        assert_eq!(frames[1].to_string(), "err\n");
    }

    #[test]
    fn tty_output_is_passed_through() {
        let frames = demultiplex(Bytes::from_static(b"\x01raw console"), true).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].to_string(), "\u{1}raw console");
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let result = demultiplex(Bytes::from_static(&[1, 0, 0, 0, 0, 0, 0, 9, b'a']), false);
        assert!(matches!(result, Err(Error::MalformedResponse { .. })));
    }

    #[tokio::test]
    async fn decodes_json_lines_from_a_stream() {
        let body: BodyStream = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"{\"Type\":\"container\"}\n{\"Ty")),
            Ok(Bytes::from_static(b"pe\":\"image\"}\n\n{\"Type\":\"network\"}")),
        ]));

        let values: Vec<Value> = decode_stream(body, JsonLineDecoder::<Value>::new())
            .map(Result::unwrap)
            .collect()
            .await;

        assert_eq!(values.len(), 3);
        assert_eq!(values[1]["Type"], "image");
        assert_eq!(values[2]["Type"], "network");
    }

    #[tokio::test]
    async fn progress_error_fails_the_call() {
        let body: BodyStream = Box::pin(stream::iter(vec![Ok(Bytes::from_static(
            b"{\"status\":\"Pulling from library/nope\"}\n{\"errorDetail\":{\"message\":\"not found\"},\"error\":\"not found\"}\n",
        ))]));

        match consume_progress(body, "pull").await {
            Err(Error::DockerStreamError { error }) => assert_eq!(error, "not found"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
