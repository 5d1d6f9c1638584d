//! Mutable derived world state: pans, cook machines, notifications, and the executed-event set.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use contracts::{PanEventType, PanLocation, ReplayConfig, MACHINE_COUNT};

use crate::keyframe::PanEvent;
use crate::layout::{queue_slot, Position};
use crate::normalize::CycleRecord;
use crate::protein::is_spicy;

#[derive(Debug, Clone, PartialEq)]
pub struct Pan {
    pub protein_pan: String,
    pub protein_name: String,
    pub location: PanLocation,
    pub expire_date: Option<DateTime<Utc>>,
    /// Fixed queue slot assigned at reset.
    pub home: Position,
    pub position: Position,
    /// Pending transition target, committed at the next frame boundary.
    pub next: Option<Position>,
}

impl Pan {
    fn new(protein_pan: &str, protein_name: &str) -> Self {
        Self {
            protein_pan: protein_pan.to_string(),
            protein_name: protein_name.to_string(),
            location: PanLocation::Unknown,
            expire_date: None,
            home: Position::default(),
            position: Position::default(),
            next: None,
        }
    }

    /// Where the pan is headed if a transition is pending, otherwise where it rests.
    pub fn effective_position(&self) -> Position {
        self.next.unwrap_or(self.position)
    }

    fn commit(&mut self) {
        if let Some(next) = self.next.take() {
            self.position = next;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    /// Serves spicy pans when set, non-spicy pans otherwise.
    pub open_mode: bool,
    pub cooking: bool,
    pub cooking_protein: Option<String>,
    pub cooking_finish_time: Option<DateTime<Utc>>,
}

impl Machine {
    fn idle(open_mode: bool) -> Self {
        Self {
            open_mode,
            cooking: false,
            cooking_protein: None,
            cooking_finish_time: None,
        }
    }

    pub(crate) fn release(&mut self) {
        self.cooking = false;
        self.cooking_protein = None;
        self.cooking_finish_time = None;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub message: String,
    /// Remaining lifetime in frames.
    pub duration: f32,
    pub event: PanEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub event_type: PanEventType,
    pub timestamp: DateTime<Utc>,
    pub cycle: usize,
}

impl From<&PanEvent> for EventKey {
    fn from(event: &PanEvent) -> Self {
        Self {
            event_type: event.event_type,
            timestamp: event.timestamp,
            cycle: event.cycle,
        }
    }
}

pub const NOTIFICATION_FRAMES: f32 = 100.0;

fn machine_modes(spicy_left: bool) -> [bool; MACHINE_COUNT] {
    let half = MACHINE_COUNT / 2;
    std::array::from_fn(|slot| (slot < half) == spicy_left)
}

#[derive(Debug, Clone)]
pub struct EntityRegistry {
    pub(crate) config: ReplayConfig,
    pub(crate) pans: Vec<Pan>,
    pub(crate) pan_index: BTreeMap<String, usize>,
    pub(crate) machines: [Machine; MACHINE_COUNT],
    pub(crate) notifications: Vec<Notification>,
    pub(crate) executed: HashSet<EventKey>,
    pub(crate) current_breader: Option<String>,
}

impl EntityRegistry {
    pub fn new(records: &[CycleRecord], config: ReplayConfig) -> Self {
        let mut registry = Self {
            config,
            pans: Vec::new(),
            pan_index: BTreeMap::new(),
            machines: machine_modes(config.spicy_left).map(Machine::idle),
            notifications: Vec::new(),
            executed: HashSet::new(),
            current_breader: None,
        };
        registry.reset_all(records);
        registry
    }

    /// Rebuilds every pan at its home slot, idles the machines, and forgets applied events.
    pub fn reset_all(&mut self, records: &[CycleRecord]) {
        let mut pans = Vec::<Pan>::new();
        let mut seen = HashSet::<&str>::new();
        for record in records {
            if seen.insert(record.protein_pan.as_str()) {
                pans.push(Pan::new(&record.protein_pan, &record.protein_name));
            }
        }

        let spicy_first = self.config.spicy_left;
        pans.sort_by(|a, b| {
            let precedence = |pan: &Pan| spicy_first && is_spicy(&pan.protein_pan);
            precedence(b)
                .cmp(&precedence(a))
                .then_with(|| a.protein_pan.cmp(&b.protein_pan))
        });

        for (index, pan) in pans.iter_mut().enumerate() {
            pan.home = queue_slot(index);
            pan.position = pan.home;
            pan.location = PanLocation::Queue;
        }

        self.pan_index = pans
            .iter()
            .enumerate()
            .map(|(index, pan)| (pan.protein_pan.clone(), index))
            .collect();
        self.pans = pans;
        self.machines = machine_modes(self.config.spicy_left).map(Machine::idle);
        self.notifications.clear();
        self.executed.clear();
        self.current_breader = None;
    }

    pub fn config(&self) -> ReplayConfig {
        self.config
    }

    pub fn pans(&self) -> &[Pan] {
        &self.pans
    }

    pub fn pan(&self, protein_pan: &str) -> Option<&Pan> {
        self.pan_index
            .get(protein_pan)
            .and_then(|index| self.pans.get(*index))
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn machine_for(&self, protein_pan: &str) -> Option<usize> {
        self.machines
            .iter()
            .position(|machine| machine.cooking_protein.as_deref() == Some(protein_pan))
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn current_breader(&self) -> Option<&str> {
        self.current_breader.as_deref()
    }

    pub fn executed_count(&self) -> usize {
        self.executed.len()
    }

    pub(crate) fn commit_positions(&mut self) {
        for pan in &mut self.pans {
            pan.commit();
        }
    }

    pub(crate) fn decay_notifications(&mut self) {
        for notification in &mut self.notifications {
            notification.duration -= 1.0;
        }
        self.notifications
            .retain(|notification| notification.duration > 0.0);
    }
}
