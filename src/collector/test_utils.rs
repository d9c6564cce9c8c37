//! Scriptable fakes for the collector's OS and network seams.

use crate::collector::speed_test::SpeedTestError;
use crate::core::{
    AddressResolver, GaugeError, GaugeSource, PortProbe, ProcessTable, Sample, Sink,
    SpeedTestBackend, SpeedTestResult, SystemGauges,
};
use crate::network::PublicIpError;
use crate::sink::SinkError;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Gauge source replaying queued readings.
///
/// Once the queue is drained the last successful reading is repeated.
#[derive(Clone)]
pub struct FakeGaugeSource {
    host: String,
    readings: Arc<Mutex<VecDeque<Result<SystemGauges, GaugeError>>>>,
    last: Arc<Mutex<SystemGauges>>,
}

impl FakeGaugeSource {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            readings: Arc::new(Mutex::new(VecDeque::new())),
            last: Arc::new(Mutex::new(SystemGauges::default())),
        }
    }

    pub fn push_reading(&self, gauges: SystemGauges) {
        self.readings.lock().unwrap().push_back(Ok(gauges));
    }

    pub fn push_error(&self, error: GaugeError) {
        self.readings.lock().unwrap().push_back(Err(error));
    }
}

#[async_trait]
impl GaugeSource for FakeGaugeSource {
    fn host_identity(&self) -> String {
        self.host.clone()
    }

    async fn sample(&mut self) -> Result<SystemGauges, GaugeError> {
        let next = self.readings.lock().unwrap().pop_front();
        match next {
            Some(Ok(gauges)) => {
                *self.last.lock().unwrap() = gauges;
                Ok(gauges)
            }
            Some(Err(e)) => Err(e),
            None => Ok(*self.last.lock().unwrap()),
        }
    }
}

/// Process table with a fixed, editable set of names.
#[derive(Clone, Default)]
pub struct FakeProcessTable {
    names: Arc<Mutex<Vec<String>>>,
    refreshes: Arc<AtomicUsize>,
}

impl FakeProcessTable {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: Arc::new(Mutex::new(names.iter().map(|n| n.to_string()).collect())),
            refreshes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_processes(&self, names: &[&str]) {
        *self.names.lock().unwrap() = names.iter().map(|n| n.to_string()).collect();
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl ProcessTable for FakeProcessTable {
    fn refresh(&mut self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }

    fn process_names(&self) -> Vec<String> {
        self.names.lock().unwrap().clone()
    }
}

/// Port probe reporting a fixed set of open ports.
#[derive(Clone, Default)]
pub struct FakePortProbe {
    open: Arc<Mutex<HashSet<u16>>>,
}

impl FakePortProbe {
    pub fn new(open_ports: &[u16]) -> Self {
        Self {
            open: Arc::new(Mutex::new(open_ports.iter().copied().collect())),
        }
    }

    pub fn set_open(&self, open_ports: &[u16]) {
        *self.open.lock().unwrap() = open_ports.iter().copied().collect();
    }
}

#[async_trait]
impl PortProbe for FakePortProbe {
    async fn is_active(&self, port: u16) -> bool {
        self.open.lock().unwrap().contains(&port)
    }
}

/// Address resolver replaying queued public addresses.
///
/// An empty queue behaves like an unreachable echo service.
#[derive(Clone, Default)]
pub struct FakeAddressResolver {
    local: Arc<Mutex<Option<IpAddr>>>,
    public: Arc<Mutex<VecDeque<Option<IpAddr>>>>,
}

impl FakeAddressResolver {
    pub fn new(local: Option<&str>) -> Self {
        let resolver = Self::default();
        *resolver.local.lock().unwrap() = local.and_then(|ip| ip.parse().ok());
        resolver
    }

    /// Queues the next public address; `None` makes that lookup fail.
    pub fn push_public(&self, ip: Option<&str>) {
        self.public
            .lock()
            .unwrap()
            .push_back(ip.and_then(|ip| ip.parse().ok()));
    }
}

#[async_trait]
impl AddressResolver for FakeAddressResolver {
    fn local_address(&self) -> Option<IpAddr> {
        *self.local.lock().unwrap()
    }

    async fn public_address(&self) -> Result<IpAddr, PublicIpError> {
        match self.public.lock().unwrap().pop_front().flatten() {
            Some(ip) => Ok(ip),
            None => Err(PublicIpError::InvalidAddress(String::new())),
        }
    }
}

/// Benchmark backend replaying queued results.
#[derive(Clone, Default)]
pub struct FakeSpeedTest {
    results: Arc<Mutex<VecDeque<Result<SpeedTestResult, SpeedTestError>>>>,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl FakeSpeedTest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every run sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_result(&self, result: Result<SpeedTestResult, SpeedTestError>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeedTestBackend for FakeSpeedTest {
    async fn run(&self) -> Result<SpeedTestResult, SpeedTestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.results.lock().unwrap().pop_front();
        next.unwrap_or(Err(SpeedTestError::NoServers))
    }
}

/// Sink keeping samples in memory.
#[derive(Clone, Default)]
pub struct MemorySink {
    samples: Arc<Mutex<Vec<Sample>>>,
    failing: Arc<AtomicBool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent appends fail with an I/O error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.samples.lock().unwrap().clone()
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn append(&self, sample: &Sample) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "sink is read-only",
            )));
        }
        self.samples.lock().unwrap().push(sample.clone());
        Ok(())
    }
}
