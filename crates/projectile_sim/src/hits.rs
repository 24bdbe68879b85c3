//! HitResolution - targeting policy + hit callback
//!
//! Порядок проверок для каждого кандидата:
//! 1. SpecificActorOnly(a) и кандидат ≠ a → reject
//! 2. SingleHitEver и already_hit не пуст → reject
//! 3. кандидат уже в already_hit → reject
//! 4. insert + hit_callback(кандидат); результаты OR-агрегируются
//!
//! `multi_hit` здесь не участвует: несколько НОВЫХ акторов за один tick
//! получают hit и при `multi_hit = false`.

use bevy::prelude::*;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

use crate::config::TargetingMode;
use crate::error::CallbackError;
use crate::state::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    WrongTarget,
    SingleHitSpent,
    AlreadyHit,
}

/// Проверка политики + запись в already_hit (только при Admitted)
pub fn admit(mode: TargetingMode, already_hit: &mut HashSet<Entity>, candidate: Entity) -> Admission {
    if let TargetingMode::SpecificActorOnly(target) = mode {
        if candidate != target {
            return Admission::WrongTarget;
        }
    }
    if mode == TargetingMode::SingleHitEver && !already_hit.is_empty() {
        return Admission::SingleHitSpent;
    }
    if !already_hit.insert(candidate) {
        return Admission::AlreadyHit;
    }
    Admission::Admitted
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitOutcome {
    /// Хотя бы один callback вернул true
    pub hit: bool,
    /// Все допущенные кандидаты (в порядке обработки)
    pub credited: Vec<Entity>,
}

/// Падение callback: на ком и почему
#[derive(Debug, Clone, PartialEq)]
pub struct HitFailure {
    pub target: Entity,
    pub error: CallbackError,
}

/// Lock на already_hit держится только на время `admit`, callback вызывается без него.
/// Ошибка или panic callback прерывает обработку оставшихся кандидатов.
pub fn resolve<F>(
    mode: TargetingMode,
    already_hit: &Mutex<HashSet<Entity>>,
    candidates: &[Entity],
    mut on_hit: F,
) -> Result<HitOutcome, HitFailure>
where
    F: FnMut(Entity) -> Result<bool, CallbackError>,
{
    let mut outcome = HitOutcome::default();

    for &candidate in candidates {
        let admission = admit(mode, &mut lock(already_hit), candidate);
        if admission != Admission::Admitted {
            continue;
        }
        outcome.credited.push(candidate);

        let counted = catch_unwind(AssertUnwindSafe(|| on_hit(candidate)))
            .unwrap_or_else(|payload| Err(CallbackError::from_panic(payload)))
            .map_err(|error| HitFailure { target: candidate, error })?;

        outcome.hit |= counted;
    }

    Ok(outcome)
}
