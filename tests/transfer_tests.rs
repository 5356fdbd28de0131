// Integration tests for the chunk transfer protocol
//
// A payload split by ChunkSender must come out of TransferReceiver exactly
// once and byte-identical, whatever order the chunks arrive in.

use loqa_interpreter::protocol::ClientMessage;
use loqa_interpreter::transfer::{ChunkEnvelope, ChunkSender, TransferReceiver};
use loqa_interpreter::RelayError;
use tokio::sync::mpsc;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Every ordering of `items` (Heap's algorithm)
fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    fn generate<T: Clone>(k: usize, items: &mut Vec<T>, out: &mut Vec<Vec<T>>) {
        if k <= 1 {
            out.push(items.clone());
            return;
        }
        generate(k - 1, items, out);
        for i in 0..k - 1 {
            if k % 2 == 0 {
                items.swap(i, k - 1);
            } else {
                items.swap(0, k - 1);
            }
            generate(k - 1, items, out);
        }
    }

    let mut items = items.to_vec();
    let mut out = Vec::new();
    generate(items.len(), &mut items, &mut out);
    out
}

#[test]
fn test_every_arrival_order_delivers_once() {
    let sender = ChunkSender::new(1000, 1);
    let original = payload(3500);
    let prepared = sender.prepare(&original, "audio/wav", None).unwrap();
    assert_eq!(prepared.envelopes.len(), 4);

    let orders = permutations(&prepared.envelopes);
    assert_eq!(orders.len(), 24);

    for order in orders {
        let mut receiver = TransferReceiver::new();
        receiver.begin(&prepared.metadata).unwrap();

        let mut delivered = Vec::new();
        for envelope in order {
            if let Some(done) = receiver.on_envelope(envelope).unwrap() {
                delivered.push(done);
            }
        }
        // The trailing completion signal must not deliver again
        assert!(receiver
            .on_complete_signal(&prepared.metadata.transfer_id)
            .unwrap()
            .is_none());

        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].bytes, original);
        assert!(delivered[0].is_gap_free());
        assert_eq!(delivered[0].content_type.as_deref(), Some("audio/wav"));
    }
}

#[test]
fn test_duplicated_chunks_deliver_once() {
    let sender = ChunkSender::new(100, 1);
    let original = payload(450);
    let prepared = sender.prepare(&original, "audio/mpeg", None).unwrap();

    let mut receiver = TransferReceiver::new();
    let mut deliveries = 0;
    for envelope in prepared.envelopes.iter().chain(prepared.envelopes.iter()) {
        if let Some(done) = receiver.on_envelope(envelope.clone()).unwrap() {
            assert_eq!(done.bytes, original);
            deliveries += 1;
        }
    }

    assert_eq!(deliveries, 1);
    assert_eq!(receiver.pending(), 0);
}

#[test]
fn test_interleaved_transfers_stay_separate() {
    let sender = ChunkSender::new(64, 1);
    let first = payload(200);
    let second: Vec<u8> = payload(300).into_iter().rev().collect();
    let a = sender.prepare(&first, "audio/wav", None).unwrap();
    let b = sender.prepare(&second, "audio/wav", None).unwrap();

    let mut receiver = TransferReceiver::new();
    let mut interleaved: Vec<ChunkEnvelope> = Vec::new();
    let mut ea = a.envelopes.clone().into_iter().rev();
    let mut eb = b.envelopes.clone().into_iter();
    loop {
        match (ea.next(), eb.next()) {
            (None, None) => break,
            (x, y) => interleaved.extend(x.into_iter().chain(y)),
        }
    }

    let mut results = Vec::new();
    for envelope in interleaved {
        if let Some(done) = receiver.on_envelope(envelope).unwrap() {
            results.push(done);
        }
    }

    assert_eq!(results.len(), 2);
    let got_a = results.iter().find(|r| r.transfer_id == a.metadata.transfer_id).unwrap();
    let got_b = results.iter().find(|r| r.transfer_id == b.metadata.transfer_id).unwrap();
    assert_eq!(got_a.bytes, first);
    assert_eq!(got_b.bytes, second);
}

#[test]
fn test_completion_signal_skips_gaps() {
    let sender = ChunkSender::new(100, 1);
    let original = payload(300);
    let prepared = sender.prepare(&original, "audio/wav", None).unwrap();
    let id = prepared.metadata.transfer_id.clone();

    let mut receiver = TransferReceiver::new();
    receiver.begin(&prepared.metadata).unwrap();
    // Chunk 1 never arrives
    for envelope in prepared.envelopes.iter().filter(|e| e.index != 1) {
        assert!(receiver.on_envelope(envelope.clone()).unwrap().is_none());
    }

    let done = receiver.on_complete_signal(&id).unwrap().unwrap();
    assert_eq!(done.missing, vec![1]);
    assert_eq!(done.bytes.len(), 200);
    assert_eq!(&done.bytes[..100], &original[..100]);
    assert_eq!(&done.bytes[100..], &original[200..]);

    // Chunk 1 showing up late changes nothing
    assert!(receiver.on_envelope(prepared.envelopes[1].clone()).unwrap().is_none());
    assert!(receiver.is_finalized(&id));
}

#[test]
fn test_completion_for_unknown_transfer() {
    let mut receiver = TransferReceiver::new();
    let result = receiver.on_complete_signal("transfer-missing");
    assert!(matches!(result, Err(RelayError::TransportIncomplete { .. })));
}

#[tokio::test]
async fn test_send_then_receive_over_channel() {
    let sender = ChunkSender::new(16384, 1000);
    let original = payload(40 * 1024);
    let prepared = sender.prepare(&original, "audio/wav", Some("en".into())).unwrap();
    let id = prepared.metadata.transfer_id.clone();

    let (tx, mut rx) = mpsc::channel(16);
    sender.send(prepared, &tx).await.unwrap();
    drop(tx);

    let mut receiver = TransferReceiver::new();
    let mut sizes = Vec::new();
    let mut delivered = None;
    while let Some(message) = rx.recv().await {
        match message {
            ClientMessage::AudioStart(metadata) => {
                assert_eq!(metadata.total_chunks, 3);
                receiver.begin(&metadata).unwrap();
            }
            ClientMessage::AudioChunk(envelope) => {
                sizes.push(envelope.payload.len());
                if let Some(done) = receiver.on_envelope(envelope).unwrap() {
                    assert!(delivered.is_none());
                    delivered = Some(done);
                }
            }
            ClientMessage::AudioComplete { transfer_id } => {
                assert_eq!(transfer_id, id);
                assert!(receiver.on_complete_signal(&transfer_id).unwrap().is_none());
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    assert_eq!(sizes, vec![16384, 16384, 8192]);
    let delivered = delivered.unwrap();
    assert_eq!(delivered.bytes, original);
    assert_eq!(delivered.language.as_deref(), Some("en"));
}

#[test]
fn test_undersized_payload_never_leaves() {
    let sender = ChunkSender::new(16384, 1000);
    let result = sender.prepare(&payload(999), "audio/wav", None);
    assert_eq!(result.unwrap_err(), RelayError::InputRejected { size: 999, min: 1000 });
}
