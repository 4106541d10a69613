//! Claiming the `--name` display name once the server's history is known.

use std::time::Duration;

use radiochat_app::{ChatHandle, Profile, ProfileError, ProfileStore, Signal};

/// Set `name` on the profile, checked against the loaded history.
///
/// Waits for the first history snapshot or for the service to give up
/// connecting, bounded by `wait`. An empty history sends no snapshot, so in
/// that case the check runs against whatever arrived before `wait` elapsed.
pub async fn claim_name<S: ProfileStore + ?Sized>(
    handle: &ChatHandle,
    profile: &mut Profile,
    store: &S,
    name: &str,
    wait: Duration,
) -> Result<(), ProfileError> {
    let mut signals = handle.subscribe();

    if handle.state().messages.is_empty() {
        let history = async {
            while let Some(signal) = signals.recv().await {
                match signal {
                    Signal::SnapshotReplaced { .. } => break,
                    Signal::StateChanged => {
                        let state = handle.state();
                        if state.connected == Some(false) && state.error.is_some() {
                            break;
                        }
                    },
                    Signal::MessageAdmitted(_) => {},
                }
            }
        };
        if tokio::time::timeout(wait, history).await.is_err() {
            tracing::debug!(?wait, "no history before name check");
        }
    }

    profile.set_name(store, name, &handle.state())
}
