//! Seeded demo worlds built from a definition pack.

use modkit::DefinitionPack;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use sim_core::{
    Archetype, CityId, ContractKind, GovernmentData, GovernmentForm, GovernmentStructure,
    OfficePurpose, RealmId, SimConfig, SimError, SuccessionRule, ValidationError,
};
use thiserror::Error;
use tracing::info;

use crate::context::SimContext;
use crate::providers::StaticProviders;

/// Shape of a generated world.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScenarioParams {
    pub realms: u32,
    pub cities_per_realm: u32,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            realms: 4,
            cities_per_realm: 3,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("definition pack has no buildings")]
    EmptyPack,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Sim(#[from] SimError),
}

const FORMS: [GovernmentForm; 4] = [
    GovernmentForm::Monarchy,
    GovernmentForm::Chiefdom,
    GovernmentForm::Theocracy,
    GovernmentForm::Republic,
];

/// Build a world and matching providers from `pack`, seeded by
/// `config.rng_seed`. The same inputs always give the same world.
pub fn seed_world(
    config: SimConfig,
    pack: &DefinitionPack,
    params: ScenarioParams,
) -> Result<(SimContext, StaticProviders), ScenarioError> {
    if pack.buildings.is_empty() {
        return Err(ScenarioError::EmptyPack);
    }
    let mut rng = ChaCha8Rng::seed_from_u64(config.rng_seed);
    let mut ctx = SimContext::new(config)?;
    let mut providers = StaticProviders::new();

    let mut definitions = Vec::with_capacity(pack.buildings.len());
    for def in &pack.buildings {
        definitions.push((ctx.register_definition(def.clone())?, def.clone()));
    }
    for institution in &pack.institutions {
        ctx.register_institution(institution.clone())?;
    }
    let standalone: Vec<_> = definitions.iter().filter(|(_, d)| !d.is_hublet()).collect();
    let hublets: Vec<_> = definitions.iter().filter(|(_, d)| d.is_hublet()).collect();

    for archetype in Archetype::ALL {
        providers.set_skill(archetype, Decimal::new(rng.gen_range(80i64..=120), 2));
    }

    let mut next_city = 1;
    for r in 1..=params.realms {
        let realm = RealmId(r);
        let form = FORMS.choose(&mut rng).copied().unwrap_or(GovernmentForm::Monarchy);
        let data = GovernmentData::new(
            form,
            GovernmentStructure::Feudal,
            SuccessionRule::Hereditary,
            rng.gen_range(2..=5),
            Decimal::from(rng.gen_range(40i64..=80)),
        );
        ctx.create_realm(realm, data)?;

        for _ in 0..params.cities_per_realm {
            let city = CityId(next_city);
            next_city += 1;
            ctx.register_city(city, Some(realm))?;
            for (id, def) in &standalone {
                if !rng.gen_bool(0.6) {
                    continue;
                }
                let index = ctx.construct(city, *id, None)?;
                for slot in &def.worker_slots {
                    let count = rng.gen_range(slot.min..=slot.max);
                    ctx.assign_workers(city, index, slot.archetype, count)?;
                }
                if !def.is_hub() {
                    continue;
                }
                for (hid, hdef) in &hublets {
                    if !hdef.accepts_hub(def.category) || !rng.gen_bool(0.5) {
                        continue;
                    }
                    // a full hub rejects further hublets; skip rather than abort
                    let Ok(h) = ctx.construct(city, *hid, Some(index)) else {
                        continue;
                    };
                    for slot in &hdef.worker_slots {
                        let count = rng.gen_range(slot.min..=slot.max);
                        ctx.assign_workers(city, h, slot.archetype, count)?;
                    }
                }
            }
        }

        if let Some(institution) = pack.institutions.choose(&mut rng) {
            ctx.attach_institution(realm, institution.id)?;
        }
        for purpose in [OfficePurpose::ManageTaxCollection, OfficePurpose::ManageGranary] {
            let office = ctx.create_office(realm, purpose)?;
            let agent = providers.spawn_agent();
            ctx.assign_office(realm, office, agent)?;
            ctx.set_office_automation(realm, office, true)?;
        }
        for archetype in Archetype::ALL {
            providers.set_population(realm, archetype, rng.gen_range(50..=500));
        }
        providers.set_culture_match(realm, rng.gen_bool(0.7));
        providers.set_clergy_happiness(realm, Decimal::new(rng.gen_range(-10i64..=10), 1));
    }

    for r in 2..=params.realms {
        let kind = if r % 2 == 0 {
            ContractKind::Vassal
        } else {
            ContractKind::Tributary
        };
        ctx.create_contract(RealmId(1), RealmId(r), kind)?;
    }
    if let Some(edict) = pack.edicts.first() {
        if params.realms > 0 {
            ctx.enact_edict(RealmId(1), edict)?;
        }
    }

    info!(
        realms = params.realms,
        cities = next_city - 1,
        contracts = ctx.contracts().len(),
        "scenario seeded"
    );
    Ok((ctx, providers))
}
