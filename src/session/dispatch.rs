use super::phase::{Phase, SessionStatus};
use super::session::{InterviewSession, SessionState, Snapshot};
use super::view::ConnectionState;
use crate::channel::{ChannelEvent, Heartbeat, RoomEvent};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

impl InterviewSession {
    /// Route one channel event through the session
    pub(super) async fn handle_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                self.set_connection(ConnectionState::Connected).await;
            }
            ChannelEvent::Reconnected => {
                info!("Room channel restored, state sync requested");
                self.set_connection(ConnectionState::Connected).await;
            }
            ChannelEvent::Disconnected { reason } => {
                warn!("Room channel dropped: {}", reason);
                self.set_connection(ConnectionState::Disconnected).await;
            }
            ChannelEvent::Reconnecting { attempt, delay } => {
                debug!("Reconnect attempt {} in {:?}", attempt, delay);
                self.set_connection(ConnectionState::Reconnecting { attempt }).await;
            }
            ChannelEvent::ConnectionLost { reason } => {
                error!("Room channel lost, falling back to polling: {}", reason);
                self.set_connection(ConnectionState::Lost).await;
                self.start_polling().await;
            }
            ChannelEvent::Room(RoomEvent::InterviewStarted(started)) => {
                info!("Interview started at question {}", started.current_question_index);
                if let Err(e) = self.refresh().await {
                    warn!("State refetch after start failed: {:#}", e);
                    self.apply_advance(started.current_question_index, false, "interview_started")
                        .await;
                }
            }
            ChannelEvent::Room(event) => {
                let mut state = self.inner.state.lock().await;
                if state.closed {
                    return;
                }
                self.handle_room_event(&mut state, event);
                self.publish(&state);
            }
        }
    }

    /// Handler table for room events that need no I/O
    fn handle_room_event(&self, state: &mut SessionState, event: RoomEvent) {
        match event {
            RoomEvent::RoomJoined(joined) => {
                let count = state.roster.replace(&joined.participants);
                info!("Joined room with {} participants", count);

                if let Some(info) = joined.interview_info {
                    self.apply_snapshot(
                        state,
                        Snapshot {
                            status: SessionStatus::parse(&info.status),
                            index: info.current_question_index,
                            questions: Some(info.questions),
                            field: info.field,
                        },
                    );
                }
            }
            RoomEvent::InterviewStateSync(sync) => {
                state.roster.replace(&sync.participants);
                self.apply_snapshot(
                    state,
                    Snapshot {
                        status: SessionStatus::parse(&sync.status),
                        index: sync.current_question_index,
                        questions: sync.questions,
                        field: None,
                    },
                );
            }
            RoomEvent::UserJoined(raw) => {
                if !state.roster.add_raw(&raw) {
                    debug!("Ignoring malformed user_joined entry");
                }
            }
            RoomEvent::UserLeft(left) => {
                if state.roster.remove(&left.user_id).is_none() {
                    debug!("user_left for unknown participant {}", left.user_id);
                }
            }
            RoomEvent::ParticipantsList(list) => {
                state.roster.replace(&list.participants);
            }
            RoomEvent::NextQuestion(next) => {
                self.advance(state, next.next_index, next.is_complete);
            }
            RoomEvent::Heartbeat(heartbeat) => {
                self.apply_heartbeat(state, heartbeat);
            }
            RoomEvent::Error(notice) => {
                warn!("Room error: {}", notice.message);
                state.last_error = Some(notice.message);
            }
            RoomEvent::InterviewStarted(_) => {
                debug!("interview_started reached the synchronous handler");
            }
        }
    }

    /// Status-only snapshot: can finish or move the interview forward, never back
    fn apply_heartbeat(&self, state: &mut SessionState, heartbeat: Heartbeat) {
        debug!(
            "Heartbeat: {} at question {} ({} active)",
            heartbeat.status, heartbeat.current_question_index, heartbeat.active_participants
        );

        match SessionStatus::parse(&heartbeat.status) {
            SessionStatus::Completed => self.enter_complete(state),
            SessionStatus::InProgress => {
                let server_ahead = heartbeat.current_question_index > self.current_question_index();
                if state.phase == Phase::Waiting || server_ahead {
                    self.apply_snapshot(
                        state,
                        Snapshot {
                            status: SessionStatus::InProgress,
                            index: heartbeat.current_question_index,
                            questions: None,
                            field: None,
                        },
                    );
                }
            }
            SessionStatus::Waiting => {}
        }
    }

    async fn set_connection(&self, connection: ConnectionState) {
        let mut state = self.inner.state.lock().await;
        if state.closed {
            return;
        }
        state.connection = connection;
        self.publish(&state);
    }

    /// Poll current-state until the interview completes or the session closes
    async fn start_polling(&self) {
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.config.poll_interval;

        let poller = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;

            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let session = InterviewSession { inner };

                if let Err(e) = session.refresh().await {
                    warn!("State poll failed: {:#}", e);
                }

                let state = session.inner.state.lock().await;
                if state.closed || state.phase == Phase::Complete {
                    break;
                }
            }
            debug!("State polling stopped");
        });

        self.inner.tasks.lock().await.push(poller);
    }
}
