use crate::{
    camera::FaceCapture,
    common::{Config, FaceAppError, Result},
    core::{
        extractor::{DescriptorExtractor, ExtractionMode},
        matcher::{MatchSet, Matcher},
    },
    storage::{EnrollOutcome, EnrollmentStore},
};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    Capturing,
    Extracting,
    Matching,
    Matched,
    Unmatched,
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoginState::Idle => "idle",
            LoginState::Capturing => "capturing",
            LoginState::Extracting => "extracting",
            LoginState::Matching => "matching",
            LoginState::Matched => "matched",
            LoginState::Unmatched => "unmatched",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Matched(MatchSet),
    Unmatched,
}

/// Sign-up and login flows over a capture source, an extractor and a store.
pub struct FaceLogin<'a, E: DescriptorExtractor + ?Sized, S: EnrollmentStore + ?Sized> {
    extractor: &'a E,
    store: &'a S,
    matcher: Matcher,
    signup_mode: ExtractionMode,
    login_mode: ExtractionMode,
    state: LoginState,
}

impl<'a, E: DescriptorExtractor + ?Sized, S: EnrollmentStore + ?Sized> FaceLogin<'a, E, S> {
    pub fn new(config: &Config, extractor: &'a E, store: &'a S) -> Self {
        Self {
            extractor,
            store,
            matcher: Matcher::new(config.matcher.threshold),
            signup_mode: config.extraction.signup_mode,
            login_mode: config.extraction.login_mode,
            state: LoginState::Idle,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    fn transition(&mut self, next: LoginState) {
        tracing::info!("Login: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Captures a face and enrolls it under `username`. A known username
    /// gets the new descriptor(s) appended.
    pub fn sign_up(&mut self, capture: &mut dyn FaceCapture, full_name: &str, username: &str) -> Result<EnrollOutcome> {
        let full_name = full_name.trim();
        let username = username.trim();
        if full_name.is_empty() {
            return Err(FaceAppError::MissingField("full name"));
        }
        if username.is_empty() {
            return Err(FaceAppError::MissingField("username"));
        }

        let frame = capture.capture()?;
        let descriptors = self.signup_mode.select(self.extractor.extract(&frame)?);
        if descriptors.is_empty() {
            return Err(FaceAppError::NoFaceDetected);
        }

        let outcome = self.store.enroll(username, full_name, &descriptors)?;
        tracing::info!(
            "Enrolled {} ({}): {} new descriptor(s), {} total",
            username,
            if outcome.created { "new account" } else { "existing account" },
            outcome.added,
            outcome.total
        );
        Ok(outcome)
    }

    /// Runs one login attempt. Capture, extraction and store failures leave
    /// the flow back at `Idle` and are returned to the caller; nothing retries.
    pub fn log_in(&mut self, capture: &mut dyn FaceCapture) -> Result<LoginOutcome> {
        self.transition(LoginState::Capturing);
        let frame = match capture.capture() {
            Ok(frame) => frame,
            Err(e) => {
                self.transition(LoginState::Idle);
                return Err(e);
            }
        };

        self.transition(LoginState::Extracting);
        let probes = match self.extractor.extract(&frame) {
            Ok(descriptors) => self.login_mode.select(descriptors),
            Err(e) => {
                self.transition(LoginState::Idle);
                return Err(e);
            }
        };
        if probes.is_empty() {
            self.transition(LoginState::Idle);
            return Err(FaceAppError::NoFaceDetected);
        }

        self.transition(LoginState::Matching);
        let records = match self.store.all_records() {
            Ok(records) => records,
            Err(e) => {
                self.transition(LoginState::Idle);
                return Err(e);
            }
        };
        let matches = self.matcher.match_capture(&probes, &records);

        if matches.is_empty() {
            self.transition(LoginState::Unmatched);
            Ok(LoginOutcome::Unmatched)
        } else {
            self.transition(LoginState::Matched);
            Ok(LoginOutcome::Matched(matches))
        }
    }
}
