//! In-memory fakes for the pipeline's external seams (testing only).
//!
//! Provides a scripted GraphQL transport, a fixed-outcome fuzz engine, and
//! a recording publisher that satisfy the trait contracts without any
//! network or toolchain dependency.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::FuzzRunRequest;
use crate::engine::FuzzEngine;
use crate::error::{FuzzcatchError, Result};
use crate::github::GraphqlTransport;
use crate::publish::{PublishResult, Publisher};
use crate::report::Report;

// ---------------------------------------------------------------------------
// ScriptedTransport
// ---------------------------------------------------------------------------

/// Transport that replays a scripted list of response bodies and records
/// every request it was given.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Value>>,
    requests: Mutex<Vec<Value>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Value>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of requests posted so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// All request bodies posted so far, in order.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GraphqlTransport for ScriptedTransport {
    async fn post(&self, request: &Value) -> Result<Value> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| FuzzcatchError::Config("scripted transport exhausted".to_string()))
    }
}

// ---------------------------------------------------------------------------
// StaticFuzzEngine
// ---------------------------------------------------------------------------

/// Engine whose outcomes are fixed up front.
#[derive(Debug)]
pub struct StaticFuzzEngine {
    pub exit_code: i32,
    pub package: String,
    pub repro_output: String,
    reproduced: Mutex<Vec<String>>,
}

impl StaticFuzzEngine {
    pub fn new(exit_code: i32, package: &str, repro_output: &str) -> Self {
        Self {
            exit_code,
            package: package.to_string(),
            repro_output: repro_output.to_string(),
            reproduced: Mutex::new(Vec::new()),
        }
    }

    /// `<entry_point>/<case_id>` pairs the engine was asked to reproduce.
    pub fn reproduced(&self) -> Vec<String> {
        self.reproduced.lock().unwrap().clone()
    }
}

#[async_trait]
impl FuzzEngine for StaticFuzzEngine {
    async fn fuzz(&self, _request: &FuzzRunRequest) -> Result<i32> {
        Ok(self.exit_code)
    }

    async fn reproduce(
        &self,
        _request: &FuzzRunRequest,
        entry_point: &str,
        case_id: &str,
    ) -> Result<String> {
        self.reproduced
            .lock()
            .unwrap()
            .push(format!("{entry_point}/{case_id}"));
        Ok(self.repro_output.clone())
    }

    async fn package_name(&self, _request: &FuzzRunRequest) -> Result<String> {
        Ok(self.package.clone())
    }

    async fn fuzz_cache_dir(&self, working_dir: &Path) -> Result<PathBuf> {
        Ok(working_dir.join("go-cache").join("fuzz"))
    }
}

// ---------------------------------------------------------------------------
// RecordingPublisher
// ---------------------------------------------------------------------------

/// Publisher that records every report and returns a fixed result.
#[derive(Debug)]
pub struct RecordingPublisher {
    result: PublishResult,
    reports: Mutex<Vec<Report>>,
}

impl RecordingPublisher {
    pub fn new(result: PublishResult) -> Self {
        Self {
            result,
            reports: Mutex::new(Vec::new()),
        }
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, report: &Report) -> Result<PublishResult> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(self.result.clone())
    }
}
