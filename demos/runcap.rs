// Copyright 2020 Joyent, Inc.

use std::io::Error;
use std::process;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use clap::{crate_version, App, Arg, ArgMatches};
use serde_json::json;
use slog::{info, o, Drain, Logger};

use mplane::client::Client;
use mplane::message::{
    Capability, Message, Redemption, ResultMessage, Specification,
};
use mplane::scheduler::{Scheduler, Service};
use mplane::scope::{unparse_time, Extent, Precision, TimeValue, When};

static APP: &'static str = "runcap";
static DEFAULT_WHEN: &'static str = "now + 3s / 1s";

/// The same stand-in measurement the probe demo serves, here driven
/// through the full client-side flow: discover the capability, fill in
/// a specification, hold the receipt, redeem it for results.
struct IdleDelayService {
    cap: Capability,
}

impl IdleDelayService {
    fn new() -> IdleDelayService {
        let mut cap = Capability::new(
            "idle-delay",
            "now ... future / 1s".parse().expect("capability scope"),
        );
        cap.add_parameter("source.device", json!(["probe0", "probe1"]));
        cap.add_result_column("time");
        cap.add_result_column("delay.us");
        IdleDelayService { cap }
    }
}

impl Service for IdleDelayService {
    fn capability(&self) -> &Capability {
        &self.cap
    }

    fn run(
        &self,
        spec: &Specification,
        check_interrupt: &(dyn Fn() -> bool),
    ) -> Result<ResultMessage, Error> {
        let mut res = ResultMessage::from_specification(spec);
        if check_interrupt() {
            return Ok(res);
        }
        let now = Utc::now().naive_utc();
        let delay_us = 1000 + rand::random::<u32>() % 40_000;
        res.set_when(When::new(TimeValue::Absolute(now), Extent::Singleton)?);
        res.set_result_value(
            "time",
            json!(unparse_time(
                TimeValue::Absolute(now),
                Precision::Microseconds
            )),
            0,
        )?;
        res.set_result_value("delay.us", json!(delay_us), 0)?;
        Ok(res)
    }
}

pub fn parse_opts<'a, 'b>(app: String) -> ArgMatches<'a> {
    App::new(app)
        .about("Run a capability through the client-side measurement flow")
        .version(crate_version!())
        .arg(
            Arg::with_name("when")
                .help("Temporal scope for the measurement (Default: now + 3s / 1s)")
                .long("when")
                .short("w")
                .takes_value(true),
        )
        .get_matches()
}

fn bail(err: &dyn std::fmt::Display) -> ! {
    eprintln!("Error: {}", err);
    process::exit(1)
}

#[tokio::main]
async fn main() {
    let matches = parse_opts(APP.to_string());

    let plain = slog_term::PlainSyncDecorator::new(std::io::stdout());
    let root_log = Logger::root(
        Mutex::new(slog_term::FullFormat::new(plain).build()).fuse(),
        o!("build-id" => "0.1.0"),
    );

    let when = matches
        .value_of("when")
        .unwrap_or(DEFAULT_WHEN)
        .parse::<When>()
        .unwrap_or_else(|e| bail(&e));

    let mut scheduler = Scheduler::new(Some(&root_log));
    scheduler.add_service(Arc::new(IdleDelayService::new()));

    let mut client = Client::new(Some(&root_log));

    // capability discovery
    for cap in scheduler.capabilities() {
        if let Err(e) = client.handle_message(Message::Capability(cap)) {
            bail(&e);
        }
    }
    let cap = match client.capability_by_label("idle-delay") {
        Some(cap) => cap.clone(),
        None => bail(&"no idle-delay capability advertised"),
    };

    // fill in and send a specification
    let mut spec = Specification::from_capability(&cap);
    spec.set_when(when);
    if let Err(e) = spec.set_parameter_value("source.device", json!("probe0")) {
        bail(&e);
    }
    spec.retoken();
    spec.relabel("idle-delay-0");

    let (receipt, job) = match scheduler.submit(spec) {
        Ok(accepted) => accepted,
        Err(exc) => bail(&exc.errmsg()),
    };
    if let Err(e) = client.handle_message(Message::Receipt(receipt.clone())) {
        bail(&e);
    }
    info!(root_log, "holding receipt";
          "token" => receipt.token().unwrap_or("-"));

    job.run().await;

    // redeem the receipt for whatever the component produced
    let reply = scheduler.redeem(&Redemption::from_receipt(&receipt));
    if let Err(e) = client.handle_message(reply) {
        bail(&e);
    }

    for result in client.results() {
        println!(
            "{}",
            serde_json::to_string_pretty(result).expect("result serializes")
        );
    }
}
