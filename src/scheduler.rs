// Copyright 2020 Joyent, Inc.

//! Component-side measurement scheduling: given an accepted
//! specification, decide whether, when, and how often it executes, and
//! drive the measurement logic accordingly.
//!
//! The temporal reasoning all lives in [`crate::scope`] and
//! [`crate::schedule`]; this module is the only place the wall clock is
//! read. A job's repetitions are strictly sequential: the measurement
//! logic is never invoked concurrently with itself for the same
//! specification. Distinct jobs share nothing and may run concurrently.

use std::collections::HashMap;
use std::io::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDateTime, Utc};
use slog::{debug, info, o, warn, Drain, Logger};
use tokio::time::sleep;

use crate::message::{
    Capability, Envelope, Exception, Message, Receipt, Redemption,
    ResultMessage, Specification,
};
use crate::schedule::Schedule;

/// A measurement a component knows how to perform. The scheduler
/// matches incoming specifications against the advertised capability and
/// calls `run` once per scheduled repetition. `run` should poll
/// `check_interrupt` at convenient points and return promptly when it
/// reports true.
pub trait Service: Send + Sync {
    fn capability(&self) -> &Capability;

    fn run(
        &self,
        spec: &Specification,
        check_interrupt: &(dyn Fn() -> bool),
    ) -> Result<ResultMessage, Error>;
}

fn wallclock() -> NaiveDateTime {
    Utc::now().naive_utc()
}

async fn sleep_for(delay: chrono::Duration) {
    // a negative delay means the instant has already passed
    if let Ok(delay) = delay.to_std() {
        sleep(delay).await;
    }
}

/// One accepted specification bound to the service that will execute
/// it, plus the receipt handed back to the client and the results
/// produced so far.
pub struct Job {
    spec: Specification,
    service: Arc<dyn Service>,
    receipt: Receipt,
    interrupt: AtomicBool,
    finished: AtomicBool,
    results: Mutex<Vec<Message>>,
    log: Logger,
}

impl Job {
    fn new(spec: Specification, service: Arc<dyn Service>, log: Logger) -> Job {
        let receipt = Receipt::from_specification(&spec);
        Job {
            spec,
            service,
            receipt,
            interrupt: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            results: Mutex::new(Vec::new()),
            log,
        }
    }

    pub fn specification(&self) -> &Specification {
        &self.spec
    }

    pub fn receipt(&self) -> &Receipt {
        &self.receipt
    }

    /// Ask the job to stop before its next repetition.
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::SeqCst);
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// The job's outcome so far: its receipt while still running, the
    /// sole result or exception of a completed single run, or an
    /// envelope of everything a repeated run produced.
    pub fn collect_results(&self) -> Message {
        if !self.finished() {
            return Message::Receipt(self.receipt.clone());
        }
        let mut results = self.results.lock().unwrap().clone();
        match results.len() {
            0 => Message::Exception(Exception::new(
                self.spec.token(),
                "measurement finished without producing results",
            )),
            1 => results.remove(0),
            _ => Message::Envelope(Envelope::from_messages(results)),
        }
    }

    /// Execute the specification to completion. Captures the reference
    /// instant once, arms the start timer, then runs the measurement
    /// once for a singleton scope or once per schedule instant
    /// otherwise. The gap to each successive instant is recomputed
    /// against a fresh clock read, since `now`-relative scopes shift.
    pub async fn run(&self) {
        let tzero = wallclock();
        let (sd, ed) = self.spec.when().timer_delays(tzero);

        let sd = match sd {
            Some(sd) => sd,
            None => {
                warn!(self.log, "specification has expired, not scheduling";
                      "when" => %self.spec.when());
                self.push(Message::Exception(Exception::new(
                    self.spec.token(),
                    "specification temporal scope has expired",
                )));
                self.finished.store(true, Ordering::SeqCst);
                return;
            }
        };

        debug!(self.log, "arming start timer";
               "start_delay_s" => sd.num_seconds(),
               "end_delay_s" => ed.map(|d| d.num_seconds()));
        sleep_for(sd).await;

        let repeated =
            self.spec.schedule().is_some() || self.spec.when().period().is_some();
        if !repeated {
            self.run_once();
            self.finished.store(true, Ordering::SeqCst);
            return;
        }

        // an explicit schedule wins; a bare period repeats unfiltered
        let schedule = match self.spec.schedule() {
            Some(schedule) => schedule.clone(),
            None => Schedule::new(*self.spec.when()),
        };

        for instant in schedule.instants(wallclock()) {
            if self.interrupted() {
                info!(self.log, "job interrupted";
                      "token" => self.spec.token().unwrap_or("-"));
                break;
            }
            let now = wallclock();
            if instant > now {
                sleep_for(instant - now).await;
            }
            if self.interrupted() {
                info!(self.log, "job interrupted";
                      "token" => self.spec.token().unwrap_or("-"));
                break;
            }
            self.run_once();
        }
        self.finished.store(true, Ordering::SeqCst);
    }

    fn run_once(&self) {
        let check_interrupt = || self.interrupted();
        match self.service.run(&self.spec, &check_interrupt) {
            Ok(result) => {
                debug!(self.log, "measurement produced a result";
                       "label" => result.label().unwrap_or("-"));
                self.push(Message::Result(result));
            }
            Err(err) => {
                warn!(self.log, "measurement failed"; "err" => %err);
                self.push(Message::Exception(Exception::new(
                    self.spec.token(),
                    &err.to_string(),
                )));
            }
        }
    }

    fn push(&self, msg: Message) {
        self.results.lock().unwrap().push(msg);
    }
}

/// Component-side registry binding advertised capabilities to the
/// services that implement them, and tracking the jobs created for
/// accepted specifications.
pub struct Scheduler {
    services: Vec<Arc<dyn Service>>,
    jobs: Mutex<HashMap<String, Arc<Job>>>,
    log: Logger,
}

impl Scheduler {
    pub fn new(log: Option<&Logger>) -> Scheduler {
        let log = match log {
            Some(log) => log.clone(),
            None => Logger::root(slog_stdlog::StdLog.fuse(), o!()),
        };
        Scheduler {
            services: Vec::new(),
            jobs: Mutex::new(HashMap::new()),
            log,
        }
    }

    pub fn add_service(&mut self, service: Arc<dyn Service>) {
        info!(self.log, "registered service";
              "label" => service.capability().label().unwrap_or("-"));
        self.services.push(service);
    }

    /// The capabilities this component advertises.
    pub fn capabilities(&self) -> Vec<Capability> {
        self.services
            .iter()
            .map(|service| service.capability().clone())
            .collect()
    }

    /// Accept a specification: validate it, match it to a registered
    /// service, and create its job. The caller drives [`Job::run`],
    /// typically on a spawned task, and hands the receipt back to the
    /// client.
    pub fn submit(
        &self,
        spec: Specification,
    ) -> Result<(Receipt, Arc<Job>), Exception> {
        if let Err(err) = spec.validate() {
            return Err(Exception::new(spec.token(), &err.to_string()));
        }

        let service = self
            .services
            .iter()
            .find(|service| spec.fulfills(service.capability()));
        let service = match service {
            Some(service) => Arc::clone(service),
            None => {
                return Err(Exception::new(
                    spec.token(),
                    "no capability matches this specification",
                ))
            }
        };

        let mut spec = spec;
        if spec.token().is_none() {
            spec.retoken();
        }
        let token = spec.token().unwrap_or("-").to_string();

        info!(self.log, "accepted specification";
              "label" => spec.label().unwrap_or("-"),
              "token" => %token,
              "when" => %spec.when());

        let job = Arc::new(Job::new(spec, service, self.log.clone()));
        self.jobs.lock().unwrap().insert(token, Arc::clone(&job));
        Ok((job.receipt().clone(), job))
    }

    /// Answer a redemption: the job's results if it has finished, its
    /// receipt while still pending, or an exception for an unknown
    /// token.
    pub fn redeem(&self, redemption: &Redemption) -> Message {
        let token = match redemption.token() {
            Some(token) => token,
            None => {
                return Message::Exception(Exception::new(
                    None,
                    "redemption carries no token",
                ))
            }
        };
        match self.jobs.lock().unwrap().get(token) {
            Some(job) => job.collect_results(),
            None => Message::Exception(Exception::new(
                Some(token),
                "no such measurement",
            )),
        }
    }

    pub fn job_for_token(&self, token: &str) -> Option<Arc<Job>> {
        self.jobs.lock().unwrap().get(token).map(Arc::clone)
    }
}
