use crate::{BatchState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: BatchState, msg: Msg) -> (BatchState, Vec<Effect>) {
    let effects = match msg {
        Msg::EventReceived(event) => {
            state.apply(&event);
            Vec::new()
        }
        Msg::StreamClosed => {
            state.close_stream();
            Vec::new()
        }
        Msg::CancelRequested => {
            if state.cancel() {
                vec![Effect::CloseStream]
            } else {
                Vec::new()
            }
        }
        Msg::Reset => {
            state.reset();
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
