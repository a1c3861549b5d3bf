use tokio::sync::watch;

use super::UpdateState;

/// Shared owner of the [`UpdateState`].
///
/// Transitions are evaluated and committed under the channel's lock, so two
/// triggers racing for the same guard cannot both pass it.
#[derive(Debug)]
pub struct UpdateController {
    state: watch::Sender<UpdateState>,
}

impl UpdateController {
    pub fn new(initial: UpdateState) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state }
    }

    pub fn snapshot(&self) -> UpdateState {
        self.state.borrow().clone()
    }

    /// Receive every committed state change.
    pub fn subscribe(&self) -> watch::Receiver<UpdateState> {
        self.state.subscribe()
    }

    /// Apply a fallible transition. Observers are only woken when the state
    /// actually changed.
    pub fn transition<E>(
        &self,
        f: impl FnOnce(&UpdateState) -> Result<UpdateState, E>,
    ) -> Result<UpdateState, E> {
        let mut outcome = None;
        self.state.send_if_modified(|state| match f(state) {
            Ok(next) => {
                let changed = *state != next;
                *state = next.clone();
                outcome = Some(Ok(next));
                changed
            }
            Err(e) => {
                outcome = Some(Err(e));
                false
            }
        });
        match outcome {
            Some(outcome) => outcome,
            None => unreachable!("send_if_modified always runs its closure"),
        }
    }

    /// Apply an infallible transition.
    pub fn update(&self, f: impl FnOnce(&UpdateState) -> UpdateState) -> UpdateState {
        match self.transition(|state| Ok::<_, std::convert::Infallible>(f(state))) {
            Ok(next) => next,
            Err(never) => match never {},
        }
    }
}
