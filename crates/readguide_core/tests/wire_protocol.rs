use pretty_assertions::assert_eq;
use readguide_core::{
    decode_frame, encode, try_decode_frame, update, BatchState, DecodeError, Frame, JobState,
    LifecycleEvent, Msg, StreamDecoder,
};

fn sse(frames: &[(&str, &str)]) -> String {
    frames
        .iter()
        .map(|(kind, body)| Frame::new(*kind, *body).to_sse())
        .collect()
}

#[test]
fn job_frames_carry_index_then_detail() {
    let frame = encode(&LifecycleEvent::JobProgress {
        index: 12,
        detail: "generating guide...".to_string(),
    });
    assert_eq!(frame, Frame::new("job-progress", "12|generating guide..."));

    let frame = encode(&LifecycleEvent::BatchCompleted {
        summary: "batch finished: 2/3 succeeded".to_string(),
    });
    assert_eq!(frame, Frame::new("batch-completed", "batch finished: 2/3 succeeded"));
}

#[test]
fn pipes_inside_detail_survive_the_wire() {
    let event = LifecycleEvent::JobFailed {
        index: 4,
        message: "bad | worse | worst".to_string(),
    };
    let frame = encode(&event);
    assert_eq!(frame.body, "4|bad | worse | worst");
    assert_eq!(decode_frame(&frame), Some(event));
}

#[test]
fn malformed_index_falls_back_to_zero_with_whole_body() {
    let frame = Frame::new("job-started", "not-a-number");
    assert_eq!(
        try_decode_frame(&frame),
        Err(DecodeError::MalformedIndex {
            body: "not-a-number".to_string()
        })
    );
    assert_eq!(
        decode_frame(&frame),
        Some(LifecycleEvent::JobStarted {
            index: 0,
            detail: "not-a-number".to_string()
        })
    );
}

#[test]
fn oversized_index_is_ignored_instead_of_hitting_job_zero() {
    let bytes = sse(&[
        ("job-started", "0|a"),
        ("job-completed", "18446744073709551616|999"),
    ]);
    let mut decoder = StreamDecoder::new();
    let events = decoder.feed(bytes.as_bytes());
    assert_eq!(decoder.skipped_frames(), 0);

    let state = events.into_iter().fold(BatchState::with_total(2), |state, event| {
        update(state, Msg::EventReceived(event)).0
    });
    assert_eq!(state.jobs()[0].state, JobState::Processing);
    assert_eq!(state.jobs()[0].source_name, "a");
    assert_eq!(state.jobs()[0].result_id, None);
    assert_eq!(state.jobs()[1].state, JobState::Pending);
}

#[test]
fn unknown_kinds_are_dropped() {
    assert_eq!(decode_frame(&Frame::new("content", "partial guide text")), None);
    assert_eq!(decode_frame(&Frame::new("message", "0|x")), None);
}

#[test]
fn malformed_frame_does_not_stop_later_frames() {
    let bytes = sse(&[("job-started", "not-a-number"), ("job-completed", "0|42")]);
    let mut decoder = StreamDecoder::new();
    let events = decoder.feed(bytes.as_bytes());

    let state = events.into_iter().fold(BatchState::with_total(1), |state, event| {
        update(state, Msg::EventReceived(event)).0
    });
    assert_eq!(state.jobs()[0].state, JobState::Completed);
    assert_eq!(state.jobs()[0].result_id.as_deref(), Some("42"));
}

#[test]
fn chunk_boundaries_do_not_change_decoded_events() {
    let bytes = sse(&[
        ("job-started", "0|métier.md"),
        ("content", "ignored"),
        ("job-progress", "0|multi\nline"),
        ("job-completed", "0|guide--ab12cd34"),
        ("batch-completed", "batch finished: 1/1 succeeded"),
    ]);
    let bytes = bytes.as_bytes();

    let mut whole = StreamDecoder::new();
    let expected = whole.feed(bytes);
    assert_eq!(expected.len(), 4);
    assert_eq!(whole.skipped_frames(), 1);
    assert!(!whole.finish());

    for chunk_size in [1, 2, 3, 7, 64] {
        let mut decoder = StreamDecoder::new();
        let events: Vec<_> = bytes
            .chunks(chunk_size)
            .flat_map(|chunk| decoder.feed(chunk))
            .collect();
        assert_eq!(events, expected, "chunk size {chunk_size}");
    }
}

#[test]
fn truncated_trailing_frame_is_reported_and_dropped() {
    let mut decoder = StreamDecoder::new();
    let events = decoder.feed(b"event: job-started\ndata: 0|a\n\nevent: job-completed\ndata: 0|4");
    assert_eq!(events.len(), 1);
    assert!(decoder.finish());
}
