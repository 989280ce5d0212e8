// Copyright 2020 Joyent, Inc.

use std::io::Error;
use std::process;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use clap::{crate_version, App, Arg, ArgMatches};
use serde_json::json;
use slog::{info, o, Drain, Logger};

use mplane::message::{Capability, ResultMessage, Specification};
use mplane::scheduler::{Scheduler, Service};
use mplane::scope::{unparse_time, Extent, Precision, TimeValue, When};

static APP: &'static str = "probe";
static DEFAULT_WHEN: &'static str = "now + 5s / 1s";
static DEFAULT_DEVICE: &'static str = "probe0";

/// A stand-in measurement: reports a simulated idle delay once per
/// scheduled repetition.
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
        .about("Run a demo measurement component with one scheduled probe")
        .version(crate_version!())
        .arg(
            Arg::with_name("when")
                .help("Temporal scope for the probe (Default: now + 5s / 1s)")
                .long("when")
                .short("w")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("device")
                .help("Source device to probe (Default: probe0)")
                .long("device")
                .short("d")
                .takes_value(true),
        )
        .get_matches()
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
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1)
        });
    let device = matches.value_of("device").unwrap_or(DEFAULT_DEVICE);

    let mut scheduler = Scheduler::new(Some(&root_log));
    scheduler.add_service(Arc::new(IdleDelayService::new()));

    let caps = scheduler.capabilities();
    let mut spec = Specification::from_capability(&caps[0]);
    spec.set_when(when);
    spec.set_parameter_value("source.device", json!(device))
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1)
        });

    match scheduler.submit(spec) {
        Ok((receipt, job)) => {
            info!(root_log, "measurement pending";
                  "token" => receipt.token().unwrap_or("-"),
                  "when" => %receipt.when());
            job.run().await;
            let results = job.collect_results();
            println!(
                "{}",
                serde_json::to_string_pretty(&results)
                    .expect("results serialize")
            );
        }
        Err(exc) => {
            eprintln!("Error: {}", exc.errmsg());
            process::exit(1)
        }
    }
}
