//! In-memory lab API for tests and offline demos.
//!
//! Behaves like the server for the operations the client uses: mutations
//! update the stored record, queued failures are returned once, and every
//! call is counted. A held operation blocks its callers until released,
//! which lets tests observe a call while it is still in flight.

use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex};

use chrono::Utc;

use super::{GatewayError, RequestGateway};
use crate::auth::{AuthApi, SignInForm, SignInGrant};
use crate::models::{AuthUser, LabTestRequest, RequestStatus, ResultEntry};
use crate::worklist::WorklistSource;

/// Default text the mock returns for an AI suggestion.
pub const MOCK_SUGGESTION: &str = "Values within normal range";

/// Default report link the mock returns on finalize.
pub const MOCK_PDF_LINK: &str = "https://reports.example/lab/report.pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Fetch,
    SubmitResult,
    AiSuggestion,
    Finalize,
    ListSendingLab,
    ListCompleted,
    SignIn,
    Profile,
}

struct Account {
    password: String,
    token: String,
    user: AuthUser,
}

#[derive(Default)]
struct Gate {
    held: Option<Operation>,
    waiting: usize,
}

pub struct MockGateway {
    records: Mutex<HashMap<String, LabTestRequest>>,
    failures: Mutex<HashMap<Operation, VecDeque<GatewayError>>>,
    calls: Mutex<HashMap<Operation, usize>>,
    accounts: Mutex<Vec<Account>>,
    suggestion: String,
    pdf_link: String,
    gate: Mutex<Gate>,
    gate_cv: Condvar,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            accounts: Mutex::new(Vec::new()),
            suggestion: MOCK_SUGGESTION.to_string(),
            pdf_link: MOCK_PDF_LINK.to_string(),
            gate: Mutex::new(Gate::default()),
            gate_cv: Condvar::new(),
        }
    }

    pub fn with_record(self, record: LabTestRequest) -> Self {
        self.insert(record);
        self
    }

    pub fn with_suggestion(mut self, text: &str) -> Self {
        self.suggestion = text.to_string();
        self
    }

    pub fn with_pdf_link(mut self, link: &str) -> Self {
        self.pdf_link = link.to_string();
        self
    }

    /// Register a sign-in account.
    pub fn with_account(self, password: &str, token: &str, user: AuthUser) -> Self {
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.push(Account {
                password: password.to_string(),
                token: token.to_string(),
                user,
            });
        }
        self
    }

    /// Store or replace a record, as an upstream flow would.
    pub fn insert(&self, record: LabTestRequest) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(record.id.clone(), record);
        }
    }

    /// Server-side copy of a record.
    pub fn record(&self, id: &str) -> Option<LabTestRequest> {
        self.records.lock().ok()?.get(id).cloned()
    }

    /// Make the next call of `op` fail with `err`. Queued failures stack.
    pub fn fail_next(&self, op: Operation, err: GatewayError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.entry(op).or_default().push_back(err);
        }
    }

    /// Number of calls received for `op`, including failed ones.
    pub fn calls(&self, op: Operation) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Block every call of `op` until `release` is called.
    pub fn hold(&self, op: Operation) {
        if let Ok(mut gate) = self.gate.lock() {
            gate.held = Some(op);
        }
    }

    pub fn release(&self) {
        if let Ok(mut gate) = self.gate.lock() {
            gate.held = None;
        }
        self.gate_cv.notify_all();
    }

    /// Wait until `count` callers are blocked on the held operation.
    pub fn wait_for_blocked(&self, count: usize) {
        let Ok(gate) = self.gate.lock() else { return };
        let _gate = self
            .gate_cv
            .wait_while(gate, |g| g.waiting < count)
            .ok();
    }

    fn enter(&self, op: Operation) -> Result<(), GatewayError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(op).or_insert(0) += 1;
        }

        if let Ok(mut gate) = self.gate.lock() {
            if gate.held == Some(op) {
                gate.waiting += 1;
                self.gate_cv.notify_all();
                if let Ok(mut gate) = self.gate_cv.wait_while(gate, |g| g.held == Some(op)) {
                    gate.waiting -= 1;
                }
            }
        }

        let queued = self
            .failures
            .lock()
            .ok()
            .and_then(|mut failures| failures.get_mut(&op).and_then(VecDeque::pop_front));
        match queued {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn update(
        &self,
        id: &str,
        apply: impl FnOnce(&mut LabTestRequest) -> Result<(), GatewayError>,
    ) -> Result<LabTestRequest, GatewayError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| GatewayError::Transport("mock lock poisoned".into()))?;
        let record = records
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(format!("Lab test request {id} not found")))?;
        apply(record)?;
        record.updated_at = Some(Utc::now());
        Ok(record.clone())
    }

    /// `update` behind `enter`. A queued `ReloadFailed` still lets the write
    /// land, as it would on a server that saved but could not be re-read.
    fn mutate(
        &self,
        op: Operation,
        id: &str,
        apply: impl FnOnce(&mut LabTestRequest) -> Result<(), GatewayError>,
    ) -> Result<LabTestRequest, GatewayError> {
        match self.enter(op) {
            Ok(()) => self.update(id, apply),
            Err(GatewayError::ReloadFailed(reason)) => {
                self.update(id, apply)?;
                Err(GatewayError::ReloadFailed(reason))
            }
            Err(err) => Err(err),
        }
    }

    fn filtered(&self, keep: impl Fn(&LabTestRequest) -> bool) -> Vec<LabTestRequest> {
        let mut list: Vec<LabTestRequest> = self
            .records
            .lock()
            .map(|records| records.values().filter(|r| keep(r)).cloned().collect())
            .unwrap_or_default();
        list.sort_by(|a, b| a.request_id.cmp(&b.request_id));
        list
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestGateway for MockGateway {
    fn fetch_request(&self, id: &str) -> Result<LabTestRequest, GatewayError> {
        self.enter(Operation::Fetch)?;
        self.record(id)
            .ok_or_else(|| GatewayError::NotFound(format!("Lab test request {id} not found")))
    }

    fn submit_result(&self, id: &str, entry: &ResultEntry) -> Result<LabTestRequest, GatewayError> {
        self.mutate(Operation::SubmitResult, id, |record| {
            record.result_value = Some(entry.result_value.clone());
            record.result_unit = Some(entry.result_unit.clone());
            record.reference_range = Some(entry.reference_range.clone());
            record.remarks = Some(entry.remarks.clone());
            record.result_date = Some(Utc::now());
            Ok(())
        })
    }

    fn request_ai_suggestion(
        &self,
        id: &str,
        _entry: &ResultEntry,
    ) -> Result<LabTestRequest, GatewayError> {
        let suggestion = self.suggestion.clone();
        self.mutate(Operation::AiSuggestion, id, |record| {
            if !record.has_result() {
                return Err(GatewayError::Server {
                    status: 400,
                    message: "Result must be recorded first".into(),
                });
            }
            record.ai_suggestion = Some(suggestion);
            Ok(())
        })
    }

    fn finalize_request(&self, id: &str) -> Result<LabTestRequest, GatewayError> {
        let link = self.pdf_link.clone();
        self.mutate(Operation::Finalize, id, |record| {
            record.pdf_link = Some(link);
            record.status = RequestStatus::Complete;
            Ok(())
        })
    }
}

impl WorklistSource for MockGateway {
    fn list_sending_lab(&self) -> Result<Vec<LabTestRequest>, GatewayError> {
        self.enter(Operation::ListSendingLab)?;
        Ok(self.filtered(|r| r.status != RequestStatus::Complete))
    }

    fn list_completed(&self) -> Result<Vec<LabTestRequest>, GatewayError> {
        self.enter(Operation::ListCompleted)?;
        Ok(self.filtered(|r| r.status == RequestStatus::Complete))
    }
}

impl AuthApi for MockGateway {
    fn sign_in(&self, form: &SignInForm) -> Result<SignInGrant, GatewayError> {
        self.enter(Operation::SignIn)?;
        let accounts = self
            .accounts
            .lock()
            .map_err(|_| GatewayError::Transport("mock lock poisoned".into()))?;
        accounts
            .iter()
            .find(|a| a.user.email == form.email && a.password == form.password())
            .map(|a| SignInGrant {
                token: a.token.clone(),
                user: a.user.clone(),
            })
            .ok_or_else(|| GatewayError::Server {
                status: 401,
                message: "Invalid email or password".into(),
            })
    }

    fn profile(&self) -> Result<AuthUser, GatewayError> {
        self.enter(Operation::Profile)?;
        // Without a session the mock answers for the first account.
        let accounts = self
            .accounts
            .lock()
            .map_err(|_| GatewayError::Transport("mock lock poisoned".into()))?;
        accounts
            .first()
            .map(|a| a.user.clone())
            .ok_or(GatewayError::Unauthorized)
    }
}
