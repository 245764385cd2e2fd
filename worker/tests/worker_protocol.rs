use std::path::PathBuf;

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
    specs::{AssignmentSpec, DegeneracyPolicy, OperatorSpec, Partition},
};
use tokio::{
    io::{self, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf},
    task::JoinHandle,
};
use worker::Worker;

type Rx = OnoReceiver<ReadHalf<DuplexStream>>;
type Tx = OnoSender<WriteHalf<DuplexStream>>;

/// Spawns a worker on one end of an in-memory channel and returns the coordinator's end.
fn spawn_worker() -> ((Rx, Tx), JoinHandle<worker::Result<u64>>) {
    let (one, two) = io::duplex(4096);
    let (rx1, tx1) = io::split(one);
    let (rx2, tx2) = io::split(two);

    let (rx, tx) = comms::channel(rx2, tx2);
    let handle = tokio::spawn(Worker::new().run(rx, tx));

    (comms::channel(rx1, tx1), handle)
}

fn assignment(round: u64, rows: Partition, cols: Partition, operator: OperatorSpec) -> Msg<'static> {
    Msg::Control(Command::Assign(AssignmentSpec {
        worker_id: 1,
        round,
        rows,
        cols,
        operator,
        degeneracy: DegeneracyPolicy::Flag,
        counts: false,
    }))
}

fn counted_assignment(rows: Partition, cols: Partition, operator: OperatorSpec) -> Msg<'static> {
    Msg::Control(Command::Assign(AssignmentSpec {
        worker_id: 1,
        round: 0,
        rows,
        cols,
        operator,
        degeneracy: DegeneracyPolicy::Flag,
        counts: true,
    }))
}

fn ones(n: usize) -> OperatorSpec {
    OperatorSpec::Inline {
        rows: n,
        cols: n,
        values: vec![1.; n * n],
    }
}

async fn expect_epsilon(rx: &mut Rx, buf: &mut Vec<u64>) -> (usize, Vec<f64>) {
    match rx.recv_into(buf).await.unwrap() {
        Msg::Data(Payload::Epsilon { offset, values }) => (offset, values.to_vec()),
        other => panic!("expected epsilon, got {other:?}"),
    }
}

async fn expect_correction(rx: &mut Rx, buf: &mut Vec<u64>) -> (usize, Vec<f64>) {
    match rx.recv_into(buf).await.unwrap() {
        Msg::Data(Payload::Correction { offset, values }) => (offset, values.to_vec()),
        other => panic!("expected correction, got {other:?}"),
    }
}

async fn expect_err(rx: &mut Rx, buf: &mut Vec<u64>) -> String {
    match rx.recv_into(buf).await.unwrap() {
        Msg::Err(detail) => detail.into_owned(),
        other => panic!("expected err, got {other:?}"),
    }
}

async fn disconnect(tx: &mut Tx, handle: JoinHandle<worker::Result<u64>>) -> u64 {
    tx.send(&Msg::Control(Command::Disconnect)).await.unwrap();
    handle.await.unwrap().unwrap()
}

#[tokio::test]
async fn diagonal_operator_second_half() {
    let ((mut rx, mut tx), handle) = spawn_worker();
    let mut buf = Vec::new();

    let operator = OperatorSpec::Diagonal {
        rows: 4,
        cols: 4,
        value: 2.,
    };
    let half = Partition::new(2, 2);

    tx.send(&assignment(0, half, half, operator)).await.unwrap();
    tx.send(&Msg::Data(Payload::Model(&[1., 2., 3., 4.])))
        .await
        .unwrap();

    let (offset, epsilon) = expect_epsilon(&mut rx, &mut buf).await;
    assert_eq!(offset, 2);
    assert_eq!(epsilon, vec![6., 8.]);

    tx.send(&Msg::Data(Payload::Barrier(&[2., 4., 6., 8.])))
        .await
        .unwrap();

    let (offset, correction) = expect_correction(&mut rx, &mut buf).await;
    assert_eq!(offset, 2);
    assert!((correction[0] - 1. / 3.).abs() < 1e-12);
    assert!((correction[1] - 0.25).abs() < 1e-12);

    assert_eq!(disconnect(&mut tx, handle).await, 1);
}

#[tokio::test]
async fn correction_uses_the_whole_barrier() {
    let ((mut rx, mut tx), handle) = spawn_worker();
    let mut buf = Vec::new();
    let first = Partition::new(0, 2);

    let mut corrections = Vec::new();
    for (round, barrier) in [[1., 1., 1., 1.], [1., 1., 1., 2.]].into_iter().enumerate() {
        tx.send(&assignment(round as u64, first, first, ones(4)))
            .await
            .unwrap();
        tx.send(&Msg::Data(Payload::Model(&[1.; 4]))).await.unwrap();

        let (_, epsilon) = expect_epsilon(&mut rx, &mut buf).await;
        assert_eq!(epsilon, vec![4., 4.]);

        // entry 3 belongs to another worker's rows
        tx.send(&Msg::Data(Payload::Barrier(&barrier))).await.unwrap();
        let (_, correction) = expect_correction(&mut rx, &mut buf).await;
        corrections.push(correction);
    }

    assert_eq!(corrections[0], vec![4., 4.]);
    assert_eq!(corrections[1], vec![3.5, 3.5]);
    assert_eq!(disconnect(&mut tx, handle).await, 2);
}

#[tokio::test]
async fn storage_failure_is_reported_and_worker_keeps_serving() {
    let ((mut rx, mut tx), handle) = spawn_worker();
    let mut buf = Vec::new();
    let all = Partition::new(0, 2);

    let missing = OperatorSpec::File {
        path: PathBuf::from("/definitely/not/here.safetensors"),
        tensor: "response_matrix".to_string(),
    };
    tx.send(&assignment(0, all, all, missing)).await.unwrap();
    tx.send(&Msg::Data(Payload::Model(&[1., 1.]))).await.unwrap();

    let detail = expect_err(&mut rx, &mut buf).await;
    assert!(detail.contains("worker 1"), "{detail}");

    tx.send(&assignment(1, all, all, ones(2))).await.unwrap();
    tx.send(&Msg::Data(Payload::Model(&[1., 1.]))).await.unwrap();
    let (_, epsilon) = expect_epsilon(&mut rx, &mut buf).await;
    assert_eq!(epsilon, vec![2., 2.]);

    tx.send(&Msg::Data(Payload::Barrier(&[2., 2.]))).await.unwrap();
    let (_, correction) = expect_correction(&mut rx, &mut buf).await;
    assert_eq!(correction, vec![1., 1.]);

    assert_eq!(disconnect(&mut tx, handle).await, 1);
}

#[tokio::test]
async fn counts_weight_the_correction() {
    let ((mut rx, mut tx), handle) = spawn_worker();
    let mut buf = Vec::new();
    let all = Partition::new(0, 3);

    tx.send(&counted_assignment(all, all, ones(3))).await.unwrap();
    tx.send(&Msg::Data(Payload::Model(&[1., 1., 1.]))).await.unwrap();
    tx.send(&Msg::Data(Payload::Counts(&[3., 0., 6.]))).await.unwrap();

    let (_, epsilon) = expect_epsilon(&mut rx, &mut buf).await;
    assert_eq!(epsilon, vec![3., 3., 3.]);

    tx.send(&Msg::Data(Payload::Barrier(&epsilon))).await.unwrap();
    let (_, correction) = expect_correction(&mut rx, &mut buf).await;
    assert_eq!(correction, vec![3., 3., 3.]);

    assert_eq!(disconnect(&mut tx, handle).await, 1);
}

#[tokio::test]
async fn counts_length_mismatch_is_reported() {
    let ((mut rx, mut tx), handle) = spawn_worker();
    let mut buf = Vec::new();
    let all = Partition::new(0, 2);

    tx.send(&counted_assignment(all, all, ones(2))).await.unwrap();
    tx.send(&Msg::Data(Payload::Model(&[1., 1.]))).await.unwrap();
    tx.send(&Msg::Data(Payload::Counts(&[1., 1., 1.]))).await.unwrap();

    let detail = expect_err(&mut rx, &mut buf).await;
    assert!(detail.contains("counts length mismatch"), "{detail}");

    assert_eq!(disconnect(&mut tx, handle).await, 0);
}

#[tokio::test]
async fn model_length_mismatch_is_reported() {
    let ((mut rx, mut tx), handle) = spawn_worker();
    let mut buf = Vec::new();
    let all = Partition::new(0, 3);

    tx.send(&assignment(0, all, all, ones(3))).await.unwrap();
    tx.send(&Msg::Data(Payload::Model(&[1., 1.]))).await.unwrap();

    let detail = expect_err(&mut rx, &mut buf).await;
    assert!(detail.contains("model length mismatch"), "{detail}");

    assert_eq!(disconnect(&mut tx, handle).await, 0);
}

#[tokio::test]
async fn abort_at_barrier_skips_the_adjoint() {
    let ((mut rx, mut tx), handle) = spawn_worker();
    let mut buf = Vec::new();
    let all = Partition::new(0, 2);

    tx.send(&assignment(0, all, all, ones(2))).await.unwrap();
    tx.send(&Msg::Data(Payload::Model(&[1., 1.]))).await.unwrap();
    expect_epsilon(&mut rx, &mut buf).await;

    tx.send(&Msg::Err("another worker failed".into())).await.unwrap();
    // a stale abort between rounds is ignored too
    tx.send(&Msg::Err("another worker failed".into())).await.unwrap();

    tx.send(&assignment(1, all, all, ones(2))).await.unwrap();
    tx.send(&Msg::Data(Payload::Model(&[1., 1.]))).await.unwrap();
    let (_, epsilon) = expect_epsilon(&mut rx, &mut buf).await;
    assert_eq!(epsilon, vec![2., 2.]);
    tx.send(&Msg::Data(Payload::Barrier(&epsilon))).await.unwrap();
    expect_correction(&mut rx, &mut buf).await;

    assert_eq!(disconnect(&mut tx, handle).await, 1);
}

#[tokio::test]
async fn closed_channel_ends_the_worker_with_an_error() {
    let ((rx, tx), handle) = spawn_worker();
    drop((rx, tx));

    let ret = handle.await.unwrap();
    assert!(matches!(ret, Err(worker::WorkerErr::Io(_))));
}

#[tokio::test]
async fn oversized_frame_ends_the_session_without_panicking() {
    let (mut raw, peer) = io::duplex(64);
    let (rx, tx) = io::split(peer);
    let (rx, tx) = comms::channel(rx, tx);
    let handle = tokio::spawn(Worker::new().run(rx, tx));

    raw.write_all(&u64::MAX.to_be_bytes()).await.unwrap();

    match handle.await.unwrap() {
        Err(worker::WorkerErr::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::InvalidData),
        other => panic!("expected an invalid data error, got {other:?}"),
    }
}
