//! Pan location state machine.

use chrono::Duration;
use contracts::{PanEventType, PanLocation};

use crate::keyframe::PanEvent;
use crate::layout::{Position, FUNNEL_ROW, HOLDING_ROW, QUEUE_ORIGIN_X, QUEUE_ROW, SLOT_STRIDE};
use crate::normalize::CycleRecord;
use crate::protein::{cook_duration, is_spicy, notification_message};
use crate::registry::{EntityRegistry, EventKey, Notification, NOTIFICATION_FRAMES};

pub const HOLDING_MINUTES: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    AlreadyApplied,
    /// Cook event for a pan that already owns a machine.
    AlreadyCooking,
    PanNotFound,
    NoMachineAvailable,
}

impl EntityRegistry {
    /// Applies one event at most once. Skipped events still count as executed so that
    /// replaying the same frame never retries them against a different state.
    pub(crate) fn apply_event(&mut self, event: &PanEvent, record: &CycleRecord) -> EventOutcome {
        let key = EventKey::from(event);
        if !self.executed.insert(key) {
            return EventOutcome::AlreadyApplied;
        }

        let Some(&index) = self.pan_index.get(&record.protein_pan) else {
            tracing::warn!(
                protein_pan = %record.protein_pan,
                event_type = %event.event_type,
                "pan not found for event"
            );
            return EventOutcome::PanNotFound;
        };

        let outcome = match event.event_type {
            PanEventType::Cook => self.start_cooking(index, event, record),
            PanEventType::Fill => self.finish_cooking(index),
            PanEventType::Start => self.scan_in(index, event, record),
            PanEventType::Stop => self.scan_out(index),
        };

        if outcome == EventOutcome::Applied {
            self.notify(key, event, record);
        }
        outcome
    }

    fn start_cooking(
        &mut self,
        index: usize,
        event: &PanEvent,
        record: &CycleRecord,
    ) -> EventOutcome {
        let protein_pan = &self.pans[index].protein_pan;
        if self.machine_for(protein_pan).is_some() {
            return EventOutcome::AlreadyCooking;
        }

        let spicy = is_spicy(protein_pan);
        let Some(machine) = self
            .machines
            .iter_mut()
            .find(|machine| !machine.cooking && machine.open_mode == spicy)
        else {
            tracing::warn!(
                protein_pan = %record.protein_pan,
                spicy,
                at = %event.timestamp,
                "no cook machine available"
            );
            return EventOutcome::NoMachineAvailable;
        };

        machine.cooking = true;
        machine.cooking_protein = Some(record.protein_pan.clone());
        machine.cooking_finish_time = Some(event.timestamp + cook_duration(&record.protein_name));
        EventOutcome::Applied
    }

    fn finish_cooking(&mut self, index: usize) -> EventOutcome {
        if self.config.use_breading_queue {
            self.shift_queue_forward(index);
        }

        let pan = &mut self.pans[index];
        let target = pan.effective_position().with_y(FUNNEL_ROW);
        pan.location = PanLocation::Funnel;
        pan.next = Some(target);

        if let Some(slot) = self.machine_for(&self.pans[index].protein_pan) {
            self.machines[slot].release();
        }
        EventOutcome::Applied
    }

    fn scan_in(&mut self, index: usize, event: &PanEvent, record: &CycleRecord) -> EventOutcome {
        let pan = &mut self.pans[index];
        let target = pan.effective_position().with_y(HOLDING_ROW);
        pan.location = PanLocation::Holding;
        pan.expire_date = Some(event.timestamp + Duration::minutes(HOLDING_MINUTES));
        pan.next = Some(target);
        self.current_breader = Some(record.breader_id.clone());
        EventOutcome::Applied
    }

    fn scan_out(&mut self, index: usize) -> EventOutcome {
        let target = if self.config.use_breading_queue {
            self.queue_tail(index)
        } else {
            self.pans[index].home
        };
        let pan = &mut self.pans[index];
        pan.location = PanLocation::Queue;
        pan.next = Some(target);
        EventOutcome::Applied
    }

    /// Queued pans ordered front to back by where they are, or are about to be.
    fn queue_order(&self) -> Vec<usize> {
        let mut queued = self
            .pans
            .iter()
            .enumerate()
            .filter(|(_, pan)| pan.location == PanLocation::Queue)
            .map(|(index, _)| index)
            .collect::<Vec<_>>();
        queued.sort_by(|a, b| {
            let ax = self.pans[*a].effective_position().x;
            let bx = self.pans[*b].effective_position().x;
            ax.total_cmp(&bx).then(a.cmp(b))
        });
        queued
    }

    /// Every pan behind the one leaving takes the place of the pan ahead of it.
    fn shift_queue_forward(&mut self, leaving: usize) {
        let queued = self.queue_order();
        let Some(slot) = queued.iter().position(|index| *index == leaving) else {
            return;
        };
        let targets = queued
            .iter()
            .map(|index| self.pans[*index].effective_position())
            .collect::<Vec<_>>();
        for behind in slot + 1..queued.len() {
            self.pans[queued[behind]].next = Some(targets[behind - 1]);
        }
    }

    fn queue_tail(&self, joining: usize) -> Position {
        self.queue_order()
            .into_iter()
            .rev()
            .find(|index| *index != joining)
            .map(|index| {
                let last = self.pans[index].effective_position();
                Position::new(last.x + SLOT_STRIDE, QUEUE_ROW)
            })
            .unwrap_or(Position::new(QUEUE_ORIGIN_X, QUEUE_ROW))
    }

    fn notify(&mut self, key: EventKey, event: &PanEvent, record: &CycleRecord) {
        let already_notified = self
            .notifications
            .iter()
            .any(|notification| EventKey::from(&notification.event) == key);
        if already_notified {
            return;
        }
        self.notifications.push(Notification {
            message: notification_message(event.event_type, record),
            duration: NOTIFICATION_FRAMES,
            event: event.clone(),
        });
    }
}
