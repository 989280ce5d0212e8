// Copyright 2020 Joyent, Inc.

//! mPlane: temporal scoping and scheduling for the mPlane measurement
//! protocol
//!
//! mPlane is a JSON message exchange between clients, which ask for
//! measurements, and components, which perform them. Capability
//! messages advertise what a component can do; Specification messages
//! request an execution; Receipt, Result, Redemption, and Exception
//! messages report on it. Every message carries a temporal scope, its
//! "when", and a specification may refine repetition with a calendar
//! schedule.
//!
//! Temporal scope grammar
//!
//! A "when" is rendered on the wire as:
//!
//! `<start>[ ... <end> | + <duration>][ / <period>]`
//!
//! * `<start>` and `<end>` are `past`, `now`, `future`, or a civil
//!   timestamp `YYYY-MM-DD[ HH:MM[:SS][.ffffff]]`
//!
//! * `<duration>` and `<period>` are compact durations matching
//!   `(<n>d)?(<n>h)?(<n>m)?(<n>s)?`
//!
//! * `now + 30s` runs for thirty seconds starting immediately;
//!   `2013-09-20 ... 2013-10-05` is valid between those dates;
//!   `now + 600s / 15s` repeats every fifteen seconds for ten minutes
//!
//! A schedule refines a "when" with crontab-like calendar filters,
//! serialized as a mapping keyed `when`, `months`, `days`, `weekdays`,
//! `hours`, `minutes`, and `seconds`; an absent key leaves that field
//! unfiltered.
//!
//! The `scope` and `schedule` modules are the pure core: parsing,
//! delay computation, and instant generation, all relative to an
//! explicitly supplied reference instant. The `scheduler` module is
//! the component-side consumer that arms timers and drives execution;
//! `message` is the protocol message shell; `client` caches what a
//! client retrieves.

#![allow(missing_docs)]

pub mod client;
pub mod message;
pub mod schedule;
pub mod scheduler;
pub mod scope;
