//! Test doubles for the remote target and the power analyzer.
//!
//! All doubles append to a shared [`Events`] log so tests can check the
//! order in which the testbed drives them.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::facility::{self, MeterError, PowerAnalyzer};
use crate::measurement::{ChannelStatistics, MeasurementWindow};
use crate::remote::{self, Connector, RemoteError, RemoteSession, SessionResult};

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Open,
    OpenFailed,
    Execute(String),
    Close,
    Start,
    Stop,
    Fetch,
    Label(String),
}

pub type Events = Rc<RefCell<Vec<Event>>>;

pub fn events() -> Events {
    Rc::new(RefCell::new(Vec::new()))
}

/// Connector whose `open` calls succeed or fail according to a script.
#[derive(Debug)]
pub struct MockConnector {
    events: Events,
    /// Outcome of each successive `open`; `true` connects. Exhausted scripts connect.
    script: RefCell<VecDeque<bool>>,
    /// Exit status returned for commands other than cleanup.
    exit_status: i32,
    fail_cleanup: bool,
    /// Benchmark runs still to fail, shared by every session.
    fail_benchmarks: Rc<Cell<u32>>,
}

impl MockConnector {
    pub fn new(events: &Events) -> MockConnector {
        MockConnector {
            events: Rc::clone(events),
            script: RefCell::new(VecDeque::new()),
            exit_status: 0,
            fail_cleanup: false,
            fail_benchmarks: Rc::new(Cell::new(0)),
        }
    }

    pub fn with_script(mut self, script: &[bool]) -> MockConnector {
        self.script = RefCell::new(script.iter().cloned().collect());
        self
    }

    pub fn always_failing(self) -> MockConnector {
        self.with_script(&[false; 64])
    }

    pub fn with_exit_status(mut self, exit_status: i32) -> MockConnector {
        self.exit_status = exit_status;
        self
    }

    pub fn with_failing_cleanup(mut self) -> MockConnector {
        self.fail_cleanup = true;
        self
    }

    /// Make the first `count` benchmark commands break the session.
    pub fn with_failing_benchmark(self, count: u32) -> MockConnector {
        self.fail_benchmarks.set(count);
        self
    }
}

impl Connector for MockConnector {
    fn open(&self) -> remote::Result<Box<dyn RemoteSession>> {
        let connects = self.script.borrow_mut().pop_front().unwrap_or(true);
        if connects {
            self.events.borrow_mut().push(Event::Open);
            Ok(Box::new(MockSession {
                events: Rc::clone(&self.events),
                exit_status: self.exit_status,
                fail_cleanup: self.fail_cleanup,
                fail_benchmarks: Rc::clone(&self.fail_benchmarks),
            }))
        } else {
            self.events.borrow_mut().push(Event::OpenFailed);
            Err(RemoteError::Connection("host unreachable".to_string()))
        }
    }
}

struct MockSession {
    events: Events,
    exit_status: i32,
    fail_cleanup: bool,
    fail_benchmarks: Rc<Cell<u32>>,
}

impl RemoteSession for MockSession {
    fn execute(&mut self, command: &str) -> remote::Result<SessionResult> {
        self.events.borrow_mut().push(Event::Execute(command.to_string()));
        if command.starts_with("rm ") {
            if self.fail_cleanup {
                return Err(RemoteError::Session("channel closed".to_string()));
            }
            return Ok(SessionResult::new(0, "", ""));
        }

        let failures = self.fail_benchmarks.get();
        if failures > 0 {
            self.fail_benchmarks.set(failures - 1);
            return Err(RemoteError::Session("connection reset".to_string()));
        }

        let stderr = if self.exit_status == 0 { "" } else { "benchmark failed\n" };
        Ok(SessionResult::new(self.exit_status, "ok\n", stderr))
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.events.borrow_mut().push(Event::Close);
    }
}

/// Analyzer handing out queued windows, one per fetch.
#[derive(Debug)]
pub struct MockAnalyzer {
    events: Events,
    windows: VecDeque<(MeasurementWindow, ChannelStatistics)>,
    fail_fetches: u32,
}

impl MockAnalyzer {
    pub fn new(events: &Events) -> MockAnalyzer {
        MockAnalyzer {
            events: Rc::clone(events),
            windows: VecDeque::new(),
            fail_fetches: 0,
        }
    }

    pub fn with_window(mut self, start: f64, end: f64, average: f64) -> MockAnalyzer {
        let window = MeasurementWindow { start, end, offset: 0.0, sample_rate: 1000 };
        let stats = ChannelStatistics { minimum: average / 2.0, maximum: average * 2.0, average };
        self.windows.push_back((window, stats));
        self
    }

    /// Make the first `count` fetches report no recording.
    pub fn with_failed_fetches(mut self, count: u32) -> MockAnalyzer {
        self.fail_fetches = count;
        self
    }
}

impl PowerAnalyzer for MockAnalyzer {
    fn start(&mut self) -> facility::Result<()> {
        self.events.borrow_mut().push(Event::Start);
        Ok(())
    }

    fn stop(&mut self) -> facility::Result<()> {
        self.events.borrow_mut().push(Event::Stop);
        Ok(())
    }

    fn fetch_window_and_statistics(&mut self, _channel: &str)
                                   -> facility::Result<(MeasurementWindow, ChannelStatistics)>
    {
        self.events.borrow_mut().push(Event::Fetch);
        if self.fail_fetches > 0 {
            self.fail_fetches -= 1;
            return Err(MeterError::NoRecordingAvailable);
        }

        match self.windows.pop_front() {
            Some(data) => Ok(data),
            None => Ok((MeasurementWindow { start: 0.0, end: 1.0, offset: 0.0, sample_rate: 1000 },
                        ChannelStatistics { minimum: 0.1, maximum: 0.3, average: 0.2 })),
        }
    }

    fn label(&mut self, name: &str) -> facility::Result<()> {
        self.events.borrow_mut().push(Event::Label(name.to_string()));
        Ok(())
    }
}
