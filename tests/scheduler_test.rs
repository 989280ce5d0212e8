// Copyright 2020 Joyent, Inc.

use std::io::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::Utc;
use serde_json::json;
use slog::{o, Drain, Level, LevelFilter, Logger};
use tokio::time::sleep;
use tokio_test::block_on;

use mplane::client::Client;
use mplane::message::{
    Capability, Message, Redemption, ResultMessage, Specification,
};
use mplane::scheduler::{Scheduler, Service};
use mplane::scope::{unparse_time, Extent, Precision, TimeValue, When};

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
        res.set_when(When::new(TimeValue::Absolute(now), Extent::Singleton)?);
        res.set_result_value(
            "time",
            json!(unparse_time(
                TimeValue::Absolute(now),
                Precision::Microseconds
            )),
            0,
        )?;
        res.set_result_value("delay.us", json!(4200), 0)?;
        Ok(res)
    }
}

fn test_log() -> Logger {
    let plain = slog_term::PlainSyncDecorator::new(std::io::stdout());
    Logger::root(
        Mutex::new(LevelFilter::new(
            slog_term::FullFormat::new(plain).build(),
            Level::Info,
        ))
        .fuse(),
        o!("build-id" => "0.1.0"),
    )
}

fn component() -> Scheduler {
    let log = test_log();
    let mut scheduler = Scheduler::new(Some(&log));
    scheduler.add_service(Arc::new(IdleDelayService::new()));
    scheduler
}

async fn wait_for_finish(job: &Arc<mplane::scheduler::Job>) {
    // generous bound so a wedged job fails the test instead of hanging it
    for _ in 0..600 {
        if job.finished() {
            return;
        }
        sleep(StdDuration::from_millis(100)).await;
    }
    panic!("job did not finish in time");
}

#[test]
fn client_component_measurement_exchange() {
    block_on(async {
        let scheduler = component();
        let mut client = Client::new(None);

        // capability discovery
        for cap in scheduler.capabilities() {
            client
                .handle_message(Message::Capability(cap))
                .expect("capability handled");
        }
        let cap = client
            .capability_by_label("idle-delay")
            .expect("capability cached")
            .clone();

        // fill in a specification and send it
        let mut spec = Specification::from_capability(&cap);
        spec.set_when("now + 2s / 1s".parse::<When>().unwrap());
        spec.set_parameter_value("source.device", json!("probe0"))
            .expect("parameter set");
        spec.retoken();
        spec.relabel("idle-delay-0");

        let (receipt, job) = scheduler.submit(spec).expect("specification accepted");
        client
            .handle_message(Message::Receipt(receipt.clone()))
            .expect("receipt handled");
        assert_eq!(client.receipts().len(), 1);

        // a redemption before completion just returns the receipt
        let redemption = Redemption::from_receipt(&receipt);
        match scheduler.redeem(&redemption) {
            Message::Receipt(r) => assert_eq!(r.token(), receipt.token()),
            other => panic!("unexpected {:?}", other),
        }

        let runner = Arc::clone(&job);
        let handle = tokio::spawn(async move { runner.run().await });
        wait_for_finish(&job).await;
        handle.await.expect("job task");

        // three instants fall in a two second scope at a one second period
        let reply = scheduler.redeem(&redemption);
        match &reply {
            Message::Envelope(envelope) => {
                assert_eq!(envelope.len(), 3);
                for msg in envelope.messages() {
                    assert_eq!(msg.kind(), "result");
                }
            }
            other => panic!("unexpected {:?}", other),
        }

        // repetition results share the token, so the client cache
        // collapses them and redeems the pending receipt
        client.handle_message(reply).expect("results handled");
        assert!(client.receipts().is_empty());
        assert_eq!(client.results().len(), 1);
        assert_eq!(
            client.results()[0].result_value("delay.us", 0),
            Some(&json!(4200))
        );
    });
}

#[test]
fn unbounded_job_stops_on_interrupt() {
    block_on(async {
        let scheduler = component();
        let caps = scheduler.capabilities();
        let mut spec = Specification::from_capability(&caps[0]);
        spec.set_when("now ... future / 1s".parse::<When>().unwrap());
        spec.set_parameter_value("source.device", json!("probe1"))
            .expect("parameter set");

        let (_, job) = scheduler.submit(spec).expect("specification accepted");
        let runner = Arc::clone(&job);
        let handle = tokio::spawn(async move { runner.run().await });

        sleep(StdDuration::from_millis(2500)).await;
        assert!(!job.finished());
        job.interrupt();
        handle.await.expect("job task");
        assert!(job.finished());

        match job.collect_results() {
            Message::Envelope(envelope) => {
                assert!(envelope.len() >= 2, "got {} results", envelope.len());
                for msg in envelope.messages() {
                    assert_eq!(msg.kind(), "result");
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    });
}
