use crate::cell::Cell;
use crate::error::{Phase, SimError};
use crate::metrics::KpiSummary;
use crate::trace::{SimulationReport, SliceSummary};
use slicesim_abstract::{Direction, IntervalContext, SimulationConfig, TrafficRecord};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::{debug, info};

/// The periodic processes sharing the simulation clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Process {
    Allocation,
    SliceStep { slice: usize, direction: Direction },
    Statistics,
}

impl Process {
    /// Order among processes due at the same millisecond. Allocation must
    /// have set the shares before any slice of that tick steps, and a
    /// snapshot sees the records the tick produced.
    fn priority(&self) -> u8 {
        match self {
            Process::Allocation => 0,
            Process::SliceStep { .. } => 1,
            Process::Statistics => 2,
        }
    }
}

#[derive(Debug)]
struct Event {
    time: u64,
    priority: u8,
    process: Process,
    id: u64, // Unique ID to differentiate events at same time and priority
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.priority == other.priority && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison: smallest (time, priority, id) is Greater in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.priority.cmp(&self.priority))
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Actions buffered during one intra-slice step
#[derive(Default)]
struct ActionBuffer {
    records: Vec<TrafficRecord>,
    logs: Vec<String>,
}

/// Context implementation passed to the intra-slice scheduler
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: u64,
    interval_ms: u64,
    share: u32,
}

impl<'a> IntervalContext for ScopedContext<'a> {
    fn now(&self) -> u64 {
        self.now
    }

    fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    fn resource_share(&self) -> u32 {
        self.share
    }

    fn emit_record(&mut self, record: TrafficRecord) {
        self.buffer.records.push(record);
    }

    fn log(&mut self, message: &str) {
        self.buffer.logs.push(message.to_string());
    }
}

/// Single-threaded discrete-event driver for one cell.
pub struct Simulator {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,
    started: bool,

    config: SimulationConfig,
    measurement_interval: u64,

    cell: Cell,

    /// Number of records written per (slice label, direction).
    pub records_written: BTreeMap<(String, Direction), u64>,
}

impl Simulator {
    pub fn new(config: SimulationConfig, cell: Cell) -> Self {
        let measurement_interval = config.measurement_interval();
        Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            started: false,
            config,
            measurement_interval,
            cell,
            records_written: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    pub fn cell_mut(&mut self) -> &mut Cell {
        &mut self.cell
    }

    /// Queue `process` at `time`. Nothing is admitted past the run duration.
    fn push_event(&mut self, time: u64, process: Process) -> bool {
        if time > self.config.duration_ms {
            debug!("Not admitting {:?} at {} ms (past end of run)", process, time);
            return false;
        }
        self.event_queue.push(Event {
            time,
            priority: process.priority(),
            process,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
        true
    }

    /// Snapshots at `interval`, `2 * interval`, ... up to and including the
    /// end of the run. A trailing partial interval gets no snapshot.
    pub fn start_statistics_process(&mut self, interval: u64) {
        self.measurement_interval = interval.max(1);
        self.push_event(self.measurement_interval, Process::Statistics);
    }

    /// Allocation at 0, then every granularity while before the end of the run.
    pub fn start_allocation_process(&mut self) {
        if self.config.duration_ms > 0 {
            self.push_event(0, Process::Allocation);
        }
    }

    /// One DL process per slice, plus one UL process for slices with uplink.
    pub fn activate_slice_scheds(&mut self, interval: u64) {
        self.measurement_interval = interval.max(1);
        if self.config.duration_ms == 0 {
            return;
        }
        let lanes: Vec<(usize, Direction)> = self
            .cell
            .inter_slice()
            .slices()
            .iter()
            .enumerate()
            .flat_map(|(idx, slice)| {
                let count = if slice.has_uplink() { 2 } else { 1 };
                Direction::ALL
                    .into_iter()
                    .take(count)
                    .map(move |direction| (idx, direction))
            })
            .collect();
        for (slice, direction) in lanes {
            self.push_event(0, Process::SliceStep { slice, direction });
        }
    }

    pub fn start_processes(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        let interval = self.measurement_interval;
        info!(
            "Starting '{}': {} ms, measurement interval {} ms, allocation every {} ms, {} slices",
            self.config.name,
            self.config.duration_ms,
            interval,
            self.cell.inter_slice().granularity_ms(),
            self.cell.inter_slice().slices().len()
        );
        self.start_statistics_process(interval);
        self.start_allocation_process();
        self.activate_slice_scheds(interval);
    }

    pub fn peek_next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Process the next event. Returns true if an event was processed, false if queue is empty.
    pub fn step(&mut self) -> Result<bool, SimError> {
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return Ok(false),
        };

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.process);

        let duration = self.config.duration_ms;
        match event.process {
            Process::Allocation => {
                self.cell.inter_slice_mut().res_alloc(self.time)?;
                let next = self.time + self.cell.inter_slice().granularity_ms().max(1);
                if next < duration {
                    self.push_event(next, Process::Allocation);
                }
            }
            Process::SliceStep { slice, direction } => {
                self.run_slice_step(slice, direction)?;
                let next = self.time + self.measurement_interval;
                if next < duration {
                    self.push_event(next, event.process);
                }
            }
            Process::Statistics => {
                self.cell.record_snapshot(self.time);
                let next = self.time + self.measurement_interval;
                if next <= duration {
                    self.push_event(next, Process::Statistics);
                }
            }
        }
        Ok(true)
    }

    fn run_slice_step(&mut self, index: usize, direction: Direction) -> Result<(), SimError> {
        let now = self.time;
        let phase = Phase::SliceStep(direction);
        // The last interval is cut short at the end of the run.
        let interval_ms = self
            .measurement_interval
            .min(self.config.duration_ms.saturating_sub(now));

        let slice = self
            .cell
            .inter_slice_mut()
            .slices_mut()
            .get_mut(index)
            .ok_or_else(|| {
                SimError::malformed(phase, "?", now, format!("no slice with index {index}"))
            })?;
        let label = slice.label().to_string();
        let share = slice.share_prbs();
        let scheduler = slice.scheduler_mut(direction).ok_or_else(|| {
            SimError::malformed(phase, &label, now, format!("slice has no {direction} scheduler"))
        })?;
        let expected = scheduler.users();

        let mut buffer = ActionBuffer::default();
        {
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now,
                interval_ms,
                share,
            };
            scheduler
                .step(&mut ctx)
                .map_err(|source| SimError::Process {
                    phase,
                    label: label.clone(),
                    time_ms: now,
                    source,
                })?;
        }
        self.process_actions(&label, direction, expected, buffer)
    }

    /// Check the buffered records of one step and append them to the
    /// slice's log.
    fn process_actions(
        &mut self,
        label: &str,
        direction: Direction,
        expected_records: u32,
        buffer: ActionBuffer,
    ) -> Result<(), SimError> {
        let now = self.time;
        let phase = Phase::SliceStep(direction);

        for log in buffer.logs {
            debug!("[{} {}] {}", label, direction, log);
        }

        if buffer.records.len() != expected_records as usize {
            return Err(SimError::malformed(
                phase,
                label,
                now,
                format!(
                    "{} records for {} UEs",
                    buffer.records.len(),
                    expected_records
                ),
            ));
        }
        if let Some(bad) = buffer.records.iter().find(|r| r.time_ms != now) {
            return Err(SimError::malformed(
                phase,
                label,
                now,
                format!("UE {} record stamped {} ms", bad.ue_id, bad.time_ms),
            ));
        }
        if let Some(bad) = buffer
            .records
            .iter()
            .find(|r| r.packets_lost > r.packets_sent)
        {
            return Err(SimError::malformed(
                phase,
                label,
                now,
                format!(
                    "UE {} lost {} of {} packets",
                    bad.ue_id, bad.packets_lost, bad.packets_sent
                ),
            ));
        }

        let log = self.cell.log_mut(label, direction).ok_or_else(|| {
            SimError::malformed(phase, label, now, format!("no open {direction} log"))
        })?;
        for record in &buffer.records {
            log.append(record)?;
        }
        *self
            .records_written
            .entry((label.to_string(), direction))
            .or_insert(0) += buffer.records.len() as u64;
        Ok(())
    }

    pub fn run_until_complete(&mut self) -> Result<(), SimError> {
        self.start_processes();
        while self.step()? {}
        info!(
            "'{}' finished at {} ms, {} allocations, {} snapshots",
            self.config.name,
            self.time,
            self.cell.inter_slice().history().len(),
            self.cell.snapshots().len()
        );
        Ok(())
    }

    /// Flush and close every slice log. Safe to call more than once.
    pub fn close_logs(&mut self) -> Result<(), SimError> {
        self.cell.close_logs()
    }

    /// Produce a serializable summary of the run.
    pub fn export_report(
        &self,
        kpis: KpiSummary,
        slice_kpis: BTreeMap<String, KpiSummary>,
    ) -> SimulationReport {
        let inter_slice = self.cell.inter_slice();
        SimulationReport {
            name: self.config.name.clone(),
            duration_ms: self.config.duration_ms,
            seed: self.config.seed,
            total_prbs: self.cell.total_resource_budget(),
            inter_scheduler: inter_slice.policy_name().to_string(),
            slices: inter_slice
                .slices()
                .iter()
                .map(SliceSummary::from_slice)
                .collect(),
            allocations: inter_slice.history().to_vec(),
            snapshots: self.cell.snapshots().to_vec(),
            kpis,
            slice_kpis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::SliceSpec;
    use slicesim_abstract::{
        InterSlicePolicy, IntraSetup, IntraSliceScheduler, ScenarioConfig, SchedulerError,
        SchedulerFactory, SliceDemand,
    };

    /// Emits one record per UE carrying the share and interval length it saw.
    struct Echo {
        users: u32,
        lose: bool,
    }

    impl IntraSliceScheduler for Echo {
        fn name(&self) -> &str {
            "Echo"
        }

        fn users(&self) -> u32 {
            self.users
        }

        fn step(&mut self, ctx: &mut dyn IntervalContext) -> Result<(), SchedulerError> {
            for ue_id in 0..self.users {
                ctx.emit_record(TrafficRecord {
                    time_ms: ctx.now(),
                    ue_id,
                    sinr_db: 20.0,
                    mcs: 20,
                    buffer_bytes: 0,
                    prbs: ctx.resource_share(),
                    packets_sent: 1,
                    packets_lost: if self.lose { 2 } else { 0 },
                    bytes_delivered: ctx.interval_ms(),
                });
            }
            Ok(())
        }
    }

    struct Even;

    impl InterSlicePolicy for Even {
        fn name(&self) -> &str {
            "Even"
        }

        fn partition(
            &mut self,
            total_prbs: u32,
            demands: &[SliceDemand],
        ) -> Result<Vec<u32>, SchedulerError> {
            let n = demands.len() as u32;
            Ok(vec![total_prbs / n.max(1); demands.len()])
        }
    }

    struct Factory;

    impl SchedulerFactory for Factory {
        fn intra_scheduler(
            &self,
            kind: &str,
            setup: &IntraSetup,
        ) -> Result<Box<dyn IntraSliceScheduler>, SchedulerError> {
            Ok(Box::new(Echo {
                users: setup.users,
                lose: kind == "Liar",
            }))
        }

        fn inter_policy(&self, _kind: &str) -> Result<Box<dyn InterSlicePolicy>, SchedulerError> {
            Ok(Box::new(Even))
        }
    }

    fn simulator(dir: &std::path::Path, duration_ms: u64, intra: &str) -> Simulator {
        let mut config = ScenarioConfig::from_toml_str(
            r#"
[network]
bandwidth = 20

[[traffic]]
label = "eMBB"
dl_users = 3
ul_users = 2
dl_packet_size = 1000
ul_packet_size = 1000
dl_arrival_rate = 10.0
ul_arrival_rate = 10.0

[[traffic]]
label = "LTE"
dl_users = 1
ul_users = 0
dl_packet_size = 500
ul_packet_size = 500
dl_arrival_rate = 1.0
ul_arrival_rate = 1.0
has_uplink = false
"#,
        )
        .unwrap();
        config.simulation.duration_ms = duration_ms;
        config.network.intra_scheduler = intra.to_string();

        let mut cell = Cell::new("c1", &config.network, &config.simulation, dir, &Factory).unwrap();
        for traffic in &config.traffic {
            let spec = SliceSpec::from_config(&config.network, traffic, false);
            cell.create_slice(spec, &Factory).unwrap();
        }
        Simulator::new(config.simulation, cell)
    }

    fn event(time: u64, process: Process, id: u64) -> Event {
        Event {
            time,
            priority: process.priority(),
            process,
            id,
        }
    }

    #[test]
    fn test_event_order_time_then_priority_then_insertion() {
        let step = Process::SliceStep {
            slice: 0,
            direction: Direction::Downlink,
        };
        let mut heap = BinaryHeap::new();
        heap.push(event(1000, Process::Statistics, 0));
        heap.push(event(1000, step, 1));
        heap.push(event(1000, Process::Allocation, 2));
        heap.push(event(0, Process::Statistics, 3));
        heap.push(event(1000, step, 4));

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|e| e.id)).collect();
        assert_eq!(order, vec![3, 2, 1, 4, 0]);
    }

    #[test]
    fn test_allocation_precedes_slice_steps() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim = simulator(dir.path(), 3000, "Echo");
        sim.run_until_complete().unwrap();
        sim.close_logs().unwrap();

        let content = std::fs::read_to_string(dir.path().join("dlStsts_eMBB.txt")).unwrap();
        // Even split of 106 PRBs over two slices, visible from the first tick.
        assert!(content.lines().skip(1).all(|l| l.split(' ').nth(5) == Some("53")));
    }

    #[test]
    fn test_wake_counts_with_partial_last_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim = simulator(dir.path(), 2500, "Echo");
        sim.run_until_complete().unwrap();
        sim.close_logs().unwrap();

        // Steps at 0, 1000, 2000; snapshots at 1000, 2000; allocation at 0.
        let cell = sim.cell();
        let times: Vec<u64> = cell.snapshots().iter().map(|s| s.time_ms).collect();
        assert_eq!(times, vec![1000, 2000]);
        assert_eq!(cell.inter_slice().history().len(), 1);
        assert_eq!(sim.records_written[&("eMBB".to_string(), Direction::Downlink)], 9);
        assert_eq!(sim.records_written[&("eMBB".to_string(), Direction::Uplink)], 6);
        assert_eq!(sim.records_written[&("LTE".to_string(), Direction::Downlink)], 3);
        assert!(!sim.records_written.contains_key(&("LTE".to_string(), Direction::Uplink)));
        assert!(sim.current_time() <= 2500);
        assert_eq!(sim.remaining_events(), 0);

        let content = std::fs::read_to_string(dir.path().join("dlStsts_LTE.txt")).unwrap();
        let last = content.lines().last().unwrap();
        assert!(last.starts_with("2000 "));
        assert!(last.ends_with(" 500"));
    }

    #[test]
    fn test_snapshot_sees_records_of_same_tick() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim = simulator(dir.path(), 2000, "Echo");
        sim.run_until_complete().unwrap();
        // The step due at 1000 ms runs before the snapshot of that tick.
        let first = &sim.cell().snapshots()[0];
        assert_eq!(first.time_ms, 1000);
        assert_eq!(first.slices[0].dl_rows, 6);
        assert_eq!(first.slices[0].ul_rows, 4);
        let last = &sim.cell().snapshots()[1];
        assert_eq!(last.time_ms, 2000);
        assert_eq!(last.slices[0].dl_rows, 6);
        assert_eq!(last.slices[1].ul_rows, 0);
    }

    #[test]
    fn test_granularity_controls_allocation_wakes() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim = simulator(dir.path(), 30_000, "Echo");
        sim.run_until_complete().unwrap();
        let times: Vec<u64> = sim
            .cell()
            .inter_slice()
            .history()
            .iter()
            .map(|a| a.time_ms)
            .collect();
        assert_eq!(times, (0..10).map(|k| k * 3000).collect::<Vec<_>>());
        assert_eq!(sim.cell().snapshots().len(), 30);
    }

    #[test]
    fn test_invalid_record_stops_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim = simulator(dir.path(), 3000, "Liar");
        let err = sim.run_until_complete().unwrap_err();
        match err {
            SimError::Process {
                phase, time_ms, ..
            } => {
                assert_eq!(phase, Phase::SliceStep(Direction::Downlink));
                assert_eq!(time_ms, 0);
            }
            other => panic!("unexpected error {other}"),
        }
        sim.close_logs().unwrap();
    }

    #[test]
    fn test_zero_duration_schedules_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim = simulator(dir.path(), 0, "Echo");
        sim.start_processes();
        assert_eq!(sim.peek_next_event_time(), None);
        assert!(!sim.step().unwrap());
    }
}
