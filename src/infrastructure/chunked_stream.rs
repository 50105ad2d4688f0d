// Chunked live-point streaming: each frame is a 4-byte big-endian length + JSON
use crate::domain::point::Point;
use crate::infrastructure::http_response::brotli_compress;
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use tokio::sync::broadcast::{self, error::RecvError};

pub const CONTENT_TYPE: &str = "application/x-point-stream";

/// Create a chunked streaming response from a stream of points.
pub fn chunked_point_stream<S>(stream: S, compress: bool) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = Point> + Send + 'static,
{
    let byte_stream = stream.then(move |point| async move { serialize_frame(&point, compress).await });

    // Frames are compressed individually, so no Content-Encoding header here.
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, CONTENT_TYPE)
        .header(header::TRANSFER_ENCODING, "chunked")
        .body(Body::from_stream(byte_stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Serialize a single point to a length-prefixed frame.
pub async fn serialize_frame(point: &Point, compress: bool) -> Result<Bytes, std::io::Error> {
    let json = serde_json::to_vec(point)?;
    let payload = if compress { brotli_compress(json).await? } else { json };

    let mut frame = BytesMut::with_capacity(4 + payload.len());
    frame.put_u32(payload.len() as u32);
    frame.put_slice(&payload);
    Ok(frame.freeze())
}

/// Stream every point published on `rx`. A subscriber that falls behind
/// skips the points it missed instead of ending the stream.
pub fn stream_from_receiver(mut rx: broadcast::Receiver<Point>, compress: bool) -> impl IntoResponse {
    let points = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(point) => yield point,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "live subscriber lagged, skipping points");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    match chunked_point_stream(points, compress) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_is_length_prefixed_json() {
        let frame = serialize_frame(&Point::new(1000, 2.5), false).await.unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);

        let decoded: Point = serde_json::from_slice(&frame[4..]).unwrap();
        assert_eq!(decoded, Point::new(1000, 2.5));
    }

    #[tokio::test]
    async fn test_stream_response_headers() {
        let (tx, rx) = broadcast::channel(4);
        let response = stream_from_receiver(rx, false).into_response();
        drop(tx);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], CONTENT_TYPE);
    }
}
