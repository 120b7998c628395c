//! Property suites for the simulation's hard invariants

use duskfield::battlescape::save::{pack_tile, unpack_tile};
use duskfield::battlescape::{
    Faction, PartRef, PartSlot, Tile, UnitArchetype, UnitStats,
};
use duskfield::combat::{resolve_hit, ArmorSide, DamageType};
use duskfield::core::config::RulesConfig;
use duskfield::core::types::{Position, UnitId};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn archetype() -> UnitArchetype {
    UnitArchetype::new(
        "trooper",
        "vest",
        UnitStats {
            tu: 50,
            stamina: 50,
            health: 40,
            bravery: 40,
            reactions: 40,
            firing: 40,
            throwing: 40,
            psi_skill: 0,
            psi_strength: 30,
            melee: 40,
            strength: 30,
        },
    )
}

fn damage_type(index: u8) -> DamageType {
    match index % 9 {
        0 => DamageType::ArmorPiercing,
        1 => DamageType::Incendiary,
        2 => DamageType::HighExplosive,
        3 => DamageType::Laser,
        4 => DamageType::Plasma,
        5 => DamageType::Stun,
        6 => DamageType::Melee,
        7 => DamageType::Acid,
        _ => DamageType::Smoke,
    }
}

proptest! {
    /// health and armor stay inside [0, max] after any damage sequence
    #[test]
    fn damage_never_breaks_pool_bounds(
        seed in any::<u64>(),
        hits in prop::collection::vec((0i32..200, any::<u8>(), -6i32..6, -6i32..6, 0i32..30), 1..40),
    ) {
        let config = RulesConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut unit = duskfield::battlescape::BattleUnit::from_archetype(
            UnitId(1),
            &archetype(),
            Faction::Player,
        );

        for (power, kind, x, y, z) in hits {
            resolve_hit(
                &mut unit,
                Position::new(x, y, z),
                power,
                damage_type(kind),
                false,
                &config,
                &mut rng,
            );
            prop_assert!(unit.health >= 0);
            prop_assert!(unit.health <= unit.max_stats.health);
            prop_assert!(unit.stun >= 0);
            prop_assert!((0..=100).contains(&unit.morale));
            for side in ArmorSide::all() {
                prop_assert!(unit.armor(side) >= 0);
                prop_assert!(unit.armor(side) <= unit.max_armor(side));
            }
        }
    }

    /// packed tile records survive a byte round trip exactly
    #[test]
    fn tile_record_round_trips(
        floor in prop::option::of(0u16..500),
        west in prop::option::of(0u16..500),
        north in prop::option::of(0u16..500),
        object in prop::option::of(0u16..500),
        set in 0u8..8,
        fire in 0u8..=15,
        smoke in 0u8..=15,
        discovered_west in any::<bool>(),
        discovered_north in any::<bool>(),
    ) {
        let mut tile = Tile::new(Position::default());
        let refs = [floor, west, north, object];
        for (slot, part) in PartSlot::all().into_iter().zip(refs) {
            tile.set_part(slot, part.map(|p| PartRef { part: p, set }));
        }
        tile.set_fire(fire);
        tile.set_smoke(smoke);
        if discovered_west {
            tile.set_discovered(duskfield::battlescape::DiscoveryFlag::West);
        }
        if discovered_north {
            tile.set_discovered(duskfield::battlescape::DiscoveryFlag::North);
        }

        let record = unpack_tile(&pack_tile(&tile)).unwrap();
        for slot in PartSlot::all() {
            prop_assert_eq!(record.parts[slot.index()], tile.part(slot));
        }
        prop_assert_eq!(record.fire, tile.fire());
        prop_assert_eq!(record.smoke, tile.smoke());
        prop_assert_eq!(record.discovered[0], discovered_west);
        prop_assert_eq!(record.discovered[1], discovered_north);
    }

    /// a void verdict implies no parts, no smoke, and an empty inventory
    #[test]
    fn void_tiles_really_are_empty(
        part in prop::option::of(0u16..100),
        smoke in 0u8..=15,
        with_item in any::<bool>(),
    ) {
        let mut tile = Tile::new(Position::default());
        tile.set_part(PartSlot::Object, part.map(|p| PartRef { part: p, set: 0 }));
        tile.set_smoke(smoke);
        if with_item {
            tile.add_item(duskfield::core::types::ItemId(1));
        }

        if tile.is_void() {
            prop_assert!(tile.part(PartSlot::Object).is_none());
            prop_assert_eq!(tile.smoke(), 0);
            prop_assert!(tile.items().is_empty());
        } else {
            prop_assert!(part.is_some() || smoke > 0 || with_item);
        }
    }
}
