use rand::Rng;
use rand_distr::{Distribution, Exp};
use slicesim_abstract::SchedulerError;

/// Packets offered to a UE during one interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Offered {
    pub sent: u64,
    /// Arrivals dropped because the buffer was full. Never above `sent`.
    pub lost: u64,
}

/// Poisson packet source feeding a finite per-UE buffer.
#[derive(Debug, Clone)]
pub struct UeTrafficSource {
    id: u32,
    packet_size: u64,
    buffer_capacity: u64,
    buffer_bytes: u64,
    /// Inter-arrival distribution in ms.
    inter_arrival: Exp<f64>,
    next_arrival_ms: f64,
}

impl UeTrafficSource {
    pub fn new<R: Rng>(
        id: u32,
        packet_size: u32,
        arrival_rate_per_s: f64,
        buffer_capacity: u64,
        rng: &mut R,
    ) -> Result<Self, SchedulerError> {
        let inter_arrival = Exp::new(arrival_rate_per_s / 1000.0).map_err(|_| {
            SchedulerError::MalformedRequest(format!(
                "UE {id}: arrival rate {arrival_rate_per_s} is not a valid rate"
            ))
        })?;
        let next_arrival_ms = inter_arrival.sample(rng);
        Ok(Self {
            id,
            packet_size: packet_size as u64,
            buffer_capacity,
            buffer_bytes: 0,
            inter_arrival,
            next_arrival_ms,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn buffer_bytes(&self) -> u64 {
        self.buffer_bytes
    }

    /// Admit every arrival in `[start_ms, start_ms + len_ms)`.
    pub fn offer<R: Rng>(&mut self, start_ms: u64, len_ms: u64, rng: &mut R) -> Offered {
        let end = (start_ms + len_ms) as f64;
        let mut offered = Offered::default();
        while self.next_arrival_ms < end {
            offered.sent += 1;
            if self.buffer_bytes + self.packet_size <= self.buffer_capacity {
                self.buffer_bytes += self.packet_size;
            } else {
                offered.lost += 1;
            }
            self.next_arrival_ms += self.inter_arrival.sample(rng);
        }
        offered
    }

    /// Transmit up to `capacity` bytes and return how much left the buffer.
    pub fn drain(&mut self, capacity: u64) -> u64 {
        let delivered = self.buffer_bytes.min(capacity);
        self.buffer_bytes -= delivered;
        delivered
    }
}
