//! Intra-slice schedulers: divide a slice's resource blocks among its UEs.

use rand::SeedableRng;
use rand::rngs::StdRng;
use slicesim_abstract::{
    CarrierProfile, Direction, IntervalContext, IntraSetup, IntraSliceScheduler, MimoConfig,
    MimoMode, SchedulerError, TrafficRecord,
};
use tracing::debug;

use crate::link::{capacity_bytes, mcs_for_sinr, spectral_efficiency};
use crate::share::split_by_weights;
use crate::sinr::SinrPattern;
use crate::ue::UeTrafficSource;

/// EWMA window (in intervals) for the proportional-fair average rate.
const PF_WINDOW: f64 = 10.0;
const PF_MIN_AVERAGE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntraKind {
    RoundRobin,
    /// Weight is `rate^alpha / average^beta`.
    ProportionalFair { alpha: u8, beta: u8 },
}

impl IntraKind {
    pub fn name(&self) -> String {
        match self {
            IntraKind::RoundRobin => "RR".to_string(),
            IntraKind::ProportionalFair { alpha, beta } => format!("PF{alpha}{beta}"),
        }
    }
}

/// One direction of a slice's UE group together with its scheduling rule.
pub struct UeGroupScheduler {
    name: String,
    label: String,
    direction: Direction,
    kind: IntraKind,
    ues: Vec<UeTrafficSource>,
    sinr: SinrPattern,
    mimo: MimoConfig,
    carrier: CarrierProfile,
    rng: StdRng,
    rr_offset: usize,
    /// Delivered bytes per ms, smoothed over `PF_WINDOW` intervals.
    avg_rate: Vec<f64>,
}

impl UeGroupScheduler {
    pub fn new(kind: IntraKind, setup: &IntraSetup) -> Result<Self, SchedulerError> {
        let sinr = SinrPattern::parse(&setup.sinr_pattern)?;
        let mut rng = StdRng::seed_from_u64(setup.seed);
        let ues = (0..setup.users)
            .map(|id| {
                UeTrafficSource::new(
                    id,
                    setup.packet_size,
                    setup.arrival_rate,
                    setup.buffer_size,
                    &mut rng,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "{} {} intra scheduler {} with {} UEs",
            setup.label,
            setup.direction,
            kind.name(),
            ues.len()
        );

        Ok(Self {
            name: kind.name(),
            label: setup.label.clone(),
            direction: setup.direction,
            kind,
            avg_rate: vec![PF_MIN_AVERAGE; ues.len()],
            ues,
            sinr,
            mimo: setup.mimo,
            carrier: setup.carrier,
            rng,
            rr_offset: 0,
        })
    }

    /// Split `pool` among UEs with queued data.
    fn assign(&mut self, pool: u32, mcs: &[u8]) -> Vec<u32> {
        let mut prbs = vec![0; self.ues.len()];
        let backlogged: Vec<usize> = self
            .ues
            .iter()
            .enumerate()
            .filter(|(_, ue)| ue.buffer_bytes() > 0)
            .map(|(idx, _)| idx)
            .collect();
        if backlogged.is_empty() || pool == 0 {
            return prbs;
        }

        match self.kind {
            IntraKind::RoundRobin => {
                let n = backlogged.len();
                let base = pool / n as u32;
                let extra = (pool % n as u32) as usize;
                for (pos, &idx) in backlogged.iter().enumerate() {
                    prbs[idx] = base;
                    // The remainder rotates so no UE is favoured across intervals.
                    if (pos + n - self.rr_offset % n) % n < extra {
                        prbs[idx] += 1;
                    }
                }
                self.rr_offset = (self.rr_offset + 1) % n.max(1);
            }
            IntraKind::ProportionalFair { alpha, beta } => {
                let weights: Vec<f64> = backlogged
                    .iter()
                    .map(|&idx| {
                        let rate = spectral_efficiency(mcs[idx]);
                        let avg = self.avg_rate[idx].max(PF_MIN_AVERAGE);
                        rate.powi(alpha as i32) / avg.powi(beta as i32)
                    })
                    .collect();
                for (&idx, share) in backlogged.iter().zip(split_by_weights(pool, &weights)) {
                    prbs[idx] = share;
                }
            }
        }
        prbs
    }
}

impl IntraSliceScheduler for UeGroupScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn users(&self) -> u32 {
        self.ues.len() as u32
    }

    fn step(&mut self, ctx: &mut dyn IntervalContext) -> Result<(), SchedulerError> {
        let now = ctx.now();
        let len = ctx.interval_ms();
        let share = ctx.resource_share();

        let mut offered = Vec::with_capacity(self.ues.len());
        for ue in &mut self.ues {
            offered.push(ue.offer(now, len, &mut self.rng));
        }
        let sinr: Vec<f64> = (0..self.ues.len())
            .map(|_| self.sinr.sample(&mut self.rng))
            .collect();
        let mcs: Vec<u8> = sinr.iter().map(|&s| mcs_for_sinr(s)).collect();

        let (pool, layers) = match self.mimo.mode {
            MimoMode::SingleUser => (share, self.mimo.layers),
            MimoMode::MultiUser => (share.saturating_mul(self.mimo.layers as u32), 1),
        };
        let prbs = self.assign(pool, &mcs);

        for (idx, ue) in self.ues.iter_mut().enumerate() {
            let capacity = capacity_bytes(
                prbs[idx],
                mcs[idx],
                layers,
                &self.carrier,
                self.direction,
                len,
            );
            let delivered = ue.drain(capacity);
            let rate = if len > 0 { delivered as f64 / len as f64 } else { 0.0 };
            self.avg_rate[idx] += (rate - self.avg_rate[idx]) / PF_WINDOW;

            ctx.emit_record(TrafficRecord {
                time_ms: now,
                ue_id: ue.id(),
                sinr_db: sinr[idx],
                mcs: mcs[idx],
                buffer_bytes: ue.buffer_bytes(),
                prbs: prbs[idx],
                packets_sent: offered[idx].sent,
                packets_lost: offered[idx].lost,
                bytes_delivered: delivered,
            });
        }

        ctx.log(&format!(
            "{} {} {}: {} PRBs over {} UEs, backlog {} bytes",
            self.label,
            self.direction,
            self.name,
            share,
            self.ues.len(),
            self.backlog_bytes()
        ));
        Ok(())
    }

    fn backlog_bytes(&self) -> u64 {
        self.ues.iter().map(|ue| ue.buffer_bytes()).sum()
    }
}
