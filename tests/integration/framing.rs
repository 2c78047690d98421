//! Transport framing scenarios over in-memory streams and loopback TCP.

use crate::*;

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use aquae_core::codec;
use aquae_core::schema::{Header, IdentitySignRequest};
use aquae_core::wire::MessageType;
use aquae_node::loader;
use aquae_node::transport::{PeerError, Session, SessionError, SessionState};

#[tokio::test]
async fn frame_round_trip_in_seven_byte_chunks() {
    // A 7-byte duplex buffer forces every read to see at most 7 bytes, so
    // the state machine is exercised across many partial reads.
    let (near, far) = tokio::io::duplex(7);
    let body = vec![0xA5u8; 128];
    let expected = body.clone();

    let writer = tokio::spawn(async move {
        let mut session = Session::new(near);
        session
            .write_frame(MessageType::IdentitySignRequest, &body)
            .await
            .unwrap();
    });

    let mut reader = Session::new(far);
    assert_eq!(
        reader.read_frame().await.unwrap(),
        Some(MessageType::IdentitySignRequest)
    );
    let got = reader
        .read_body(MessageType::IdentitySignRequest)
        .await
        .unwrap();
    assert_eq!(&got[..], &expected[..]);
    assert_eq!(reader.state(), SessionState::WaitingForFrame);
    assert_eq!(reader.read_frame().await.unwrap(), None);

    writer.await.unwrap();
}

#[tokio::test]
async fn oversized_frame_is_rejected_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut session = Session::new(stream);
        session.read_frame().await
    });

    let mut client = TcpStream::connect(addr).await.unwrap();
    let header = Header {
        payload_length: Some(2 * 1024 * 1024),
        message_type: Some(MessageType::SignedQuery.wire_tag()),
    };
    let header_bytes = codec::encode("Header", &header).unwrap();
    client.write_all(&[0x00, header_bytes.len() as u8]).await.unwrap();
    client.write_all(&header_bytes).await.unwrap();
    // No payload follows; the peer must be refused before it is wanted.

    let result = server.await.unwrap();
    assert!(matches!(
        result,
        Err(SessionError::Peer(PeerError::PayloadTooLarge(_)))
    ));
}

#[tokio::test]
async fn version_mismatch_is_rejected_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut session = Session::new(stream);
        session.read_frame().await
    });

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(&[0x10]).await.unwrap();

    let result = server.await.unwrap();
    assert!(matches!(
        result,
        Err(SessionError::Peer(PeerError::BadFramingByte(0x10)))
    ));
}

#[tokio::test]
async fn concurrent_sessions_share_one_snapshot() {
    const SESSIONS: usize = 8;
    const FRAMES: usize = 16;

    let federation = Arc::new(loader::load_bytes(&metadata_bytes(&sample_federation())).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_snapshot = federation.clone();
    let server = tokio::spawn(async move {
        let mut workers = Vec::new();
        for _ in 0..SESSIONS {
            let (stream, _) = listener.accept().await.unwrap();
            let federation = server_snapshot.clone();
            workers.push(tokio::spawn(async move {
                let mut session = Session::new(stream);
                let mut seen = 0usize;
                while let Some(message_type) = session.read_frame().await.unwrap() {
                    assert_eq!(message_type, MessageType::IdentitySignRequest);
                    let request = session.read_identity_sign_request().await.unwrap();
                    for name in &request.identity_set {
                        assert!(federation.node(name).is_some(), "{name} should resolve");
                    }
                    seen += 1;
                }
                seen
            }));
        }
        let mut total = 0;
        for worker in workers {
            total += worker.await.unwrap();
        }
        total
    });

    let mut clients = Vec::new();
    for _ in 0..SESSIONS {
        clients.push(tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            let mut session = Session::new(stream);
            let request = IdentitySignRequest {
                subject: None,
                identity_set: vec!["A".into(), "B".into()],
            };
            let body = codec::encode("IdentitySignRequest", &request).unwrap();
            for _ in 0..FRAMES {
                session
                    .write_frame(MessageType::IdentitySignRequest, &body)
                    .await
                    .unwrap();
            }
        }));
    }
    for client in clients {
        client.await.unwrap();
    }

    assert_eq!(server.await.unwrap(), SESSIONS * FRAMES);
}
