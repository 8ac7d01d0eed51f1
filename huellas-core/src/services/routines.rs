// huellas-core/src/services/routines.rs
//! Short grief-coping routines and the device-local record of doing them.
//!
//! The catalog is static. Progress lives in the KV store under
//! `routine_count_<id>` and `routine_last_<id>` (RFC3339 UTC).

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::StoreError;
use crate::services::kv::KvStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Routine {
    pub id: &'static str,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub steps: &'static [&'static str],
    pub estimated_minutes: u32,
}

pub const CATALOG: &[Routine] = &[
    Routine {
        id: "breath_2min",
        title: "Respirar 2 minutos",
        subtitle: "Baja la intensidad del momento, sin pelearte con él.",
        steps: &["Inhala 4 segundos", "Sostén 2 segundos", "Exhala 6 segundos", "Repite 6 veces"],
        estimated_minutes: 2,
    },
    Routine {
        id: "write_3lines",
        title: "Escribir 3 líneas",
        subtitle: "Suelta lo que tengas dentro, sin juzgarte.",
        steps: &[
            "¿Qué siento ahora mismo?",
            "¿Qué echo de menos hoy?",
            "¿Qué necesito para estar un 1% mejor?",
        ],
        estimated_minutes: 3,
    },
    Routine {
        id: "memory_smile",
        title: "Un recuerdo bonito",
        subtitle: "Trae un momento bueno a tu presente.",
        steps: &[
            "Piensa en un momento concreto con tu mascota",
            "¿Dónde estabais? ¿Qué pasó?",
            "Escribe 1 frase para recordarlo",
        ],
        estimated_minutes: 3,
    },
    Routine {
        id: "gratitude_1min",
        title: "Gracias por… (1 minuto)",
        subtitle: "Una mini carta de gratitud.",
        steps: &[
            "Completa: \"Gracias por acompañarme cuando…\"",
            "Completa: \"Gracias por hacerme reír cuando…\"",
            "Completa: \"Hoy te honro haciendo…\"",
        ],
        estimated_minutes: 1,
    },
    Routine {
        id: "walk_5min",
        title: "Caminar 5 minutos",
        subtitle: "Un reset físico suave.",
        steps: &["Sal 5 minutos (o camina por casa)", "Respira normal, sin exigencia", "Al volver: bebe agua"],
        estimated_minutes: 5,
    },
    Routine {
        id: "talk_to_friend",
        title: "Enviar un mensaje a alguien",
        subtitle: "No tienes que llevarlo solo/a.",
        steps: &[
            "Elige una persona de confianza",
            "Escribe: \"Hoy me he acordado mucho de (nombre). ¿Te puedo contar algo?\"",
            "Envíalo sin esperar nada perfecto",
        ],
        estimated_minutes: 2,
    },
];

pub fn find_routine(id: &str) -> Option<&'static Routine> {
    CATALOG.iter().find(|r| r.id == id)
}

pub struct RoutineProgress {
    kv: Arc<dyn KvStore>,
}

impl RoutineProgress {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn completion_count(&self, routine_id: &str) -> Result<u32, StoreError> {
        let raw = self.kv.get_int(&count_key(routine_id))?.unwrap_or(0);
        Ok(u32::try_from(raw.max(0)).unwrap_or(u32::MAX))
    }

    pub fn last_completed_at(&self, routine_id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let key = last_key(routine_id);
        match self.kv.get_string(&key)? {
            None => Ok(None),
            Some(raw) => DateTime::parse_from_rfc3339(&raw)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(|_| StoreError::Parse {
                    key,
                    expected: "RFC3339 timestamp",
                    raw,
                }),
        }
    }

    /// Bump the count and stamp now. Returns the new count.
    pub fn mark_completed(&self, routine_id: &str) -> Result<u32, StoreError> {
        let count = self.completion_count(routine_id)?.saturating_add(1);
        self.kv.set_int(&count_key(routine_id), i64::from(count))?;
        self.kv.set_string(&last_key(routine_id), &Utc::now().to_rfc3339())?;
        tracing::debug!(routine = routine_id, count, "routine completed");
        Ok(count)
    }
}

fn count_key(id: &str) -> String {
    format!("routine_count_{id}")
}

fn last_key(id: &str) -> String {
    format!("routine_last_{id}")
}
