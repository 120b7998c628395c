//! End-of-round fire and smoke propagation
//!
//! Runs once per full round on a snapshot of the tiles that were already
//! burning or smoking, so nothing ignited during the pass is revisited
//! within the same pass. Every roll draws from the shared battle RNG.

use rand_chacha::ChaCha8Rng;

use crate::battlescape::constants::SMOKE_STUN_DIVISOR;
use crate::battlescape::map::BattleMap;
use crate::battlescape::services::HazardBlocking;
use crate::battlescape::terrain::{PartSlot, TerrainLibrary};
use crate::battlescape::unit::BattleUnit;
use crate::combat::damage_type::DamageType;
use crate::combat::resolution::resolve_hit;
use crate::core::config::RulesConfig;
use crate::core::dice;
use crate::core::types::{Direction, Position};

/// Aggregate outcome of one hazard pass
#[derive(Debug, Clone, Default)]
pub struct HazardReport {
    pub fires_spread: u32,
    pub fires_burned_out: u32,
    pub parts_destroyed: u32,
    pub objectives_destroyed: u32,
    pub units_burned: u32,
    pub units_choked: u32,
    /// Tiles whose terrain burned away and need gravity settling
    pub settle: Vec<Position>,
    /// Tiles holding an undetonated charge after an explosive part burned
    pub explosions_pending: Vec<Position>,
}

/// Run the full hazard pass: fire, smoke, averaging, then damage
pub fn run_hazard_pass(
    map: &mut BattleMap,
    terrain: &TerrainLibrary,
    units: &mut [BattleUnit],
    blocking: &dyn HazardBlocking,
    config: &RulesConfig,
    rng: &mut ChaCha8Rng,
) -> HazardReport {
    let mut report = HazardReport::default();

    let burning = map.burning_tiles();
    let smoking = map.smoking_tiles();

    spread_fire(map, terrain, &burning, blocking, rng, &mut report);
    spread_smoke(map, terrain, &smoking, blocking);

    // same-round smoke averaging, animation jitter, overlap/danger reset
    for tile in map.tiles_mut() {
        tile.finish_hazard_round(rng);
    }

    apply_hazard_damage(map, units, config, rng, &mut report);

    tracing::debug!(
        spread = report.fires_spread,
        burned_out = report.fires_burned_out,
        destroyed = report.parts_destroyed,
        burned = report.units_burned,
        choked = report.units_choked,
        "hazard pass complete"
    );
    report
}

/// Fire decrement, spread, and burnout destruction
fn spread_fire(
    map: &mut BattleMap,
    terrain: &TerrainLibrary,
    burning: &[usize],
    blocking: &dyn HazardBlocking,
    rng: &mut ChaCha8Rng,
    report: &mut HazardReport,
) {
    for &idx in burning {
        let Some(pos) = map.position_of(idx) else {
            continue;
        };

        if let Some(tile) = map.tile_at_mut(idx) {
            // a tile that caught new fire this round does not burn down yet
            if tile.overlaps() == 0 {
                tile.decrement_fire();
            }
        }

        let Some((fire, smoke)) = map.tile_at(idx).map(|t| (t.fire(), t.smoke())) else {
            continue;
        };

        if fire > 0 {
            for dir in Direction::cardinals() {
                let npos = pos + dir.offset();
                if blocking.is_edge_blocked(map, terrain, pos, npos, DamageType::Incendiary) {
                    continue;
                }
                if let Some(neighbor) = map.tile_mut(npos) {
                    if neighbor.ignite(i32::from(smoke), terrain, rng) {
                        report.fires_spread += 1;
                        tracing::trace!(x = npos.x, y = npos.y, z = npos.z, "fire spread");
                    }
                }
            }
        } else {
            burn_out(map, terrain, idx, pos, report);
        }
    }
}

/// A fire that just died takes its smoke and any flammable, destructible
/// floor/object parts with it
fn burn_out(
    map: &mut BattleMap,
    terrain: &TerrainLibrary,
    idx: usize,
    pos: Position,
    report: &mut HazardReport,
) {
    let Some(tile) = map.tile_at_mut(idx) else {
        return;
    };
    tile.set_smoke(0);

    let mut changed = false;
    for slot in [PartSlot::Object, PartSlot::Floor] {
        let burnable = tile
            .part(slot)
            .and_then(|p| terrain.get(p))
            .map(|p| !p.is_fireproof() && !p.is_indestructible())
            .unwrap_or(false);
        if !burnable {
            continue;
        }
        let result = tile.destroy_part(slot, terrain);
        if result.destroyed {
            report.parts_destroyed += 1;
            changed = true;
            if result.objective {
                report.objectives_destroyed += 1;
            }
        }
    }

    report.fires_burned_out += 1;
    if tile.pending_explosion() > 0 {
        report.explosions_pending.push(pos);
    }
    if changed {
        tile.recompute_obstacles(terrain);
        report.settle.push(pos);
    }
}

/// Smoke decrement and drift
fn spread_smoke(
    map: &mut BattleMap,
    terrain: &TerrainLibrary,
    smoking: &[usize],
    blocking: &dyn HazardBlocking,
) {
    for &idx in smoking {
        let Some(pos) = map.position_of(idx) else {
            continue;
        };
        let Some(on_fire) = map.tile_at(idx).map(|t| t.fire() > 0) else {
            continue;
        };

        if !on_fire {
            if let Some(tile) = map.tile_at_mut(idx) {
                if tile.overlaps() == 0 {
                    tile.decrement_smoke();
                }
            }
            let half = map.tile_at(idx).map(|t| t.smoke()).unwrap_or(0) / 2;
            if half == 0 {
                continue;
            }
            for dir in Direction::cardinals() {
                let npos = pos + dir.offset();
                if blocking.is_edge_blocked(map, terrain, pos, npos, DamageType::Smoke) {
                    continue;
                }
                if let Some(neighbor) = map.tile_mut(npos) {
                    // drift only into clear tiles or ones already fed this round
                    if neighbor.smoke() == 0 || neighbor.overlaps() > 0 {
                        neighbor.add_smoke(half);
                    }
                }
            }
        } else {
            // a burning tile pushes smoke up through a missing ceiling and
            // out in all four directions at half intensity
            let half = map.tile_at(idx).map(|t| t.smoke()).unwrap_or(0) / 2;
            if half == 0 {
                continue;
            }
            let up = pos + Position::new(0, 0, 1);
            let up_open = map.tile(up).map(|t| t.has_no_floor()).unwrap_or(false);
            if up_open {
                if let Some(above) = map.tile_mut(up) {
                    above.add_smoke(half);
                }
            }
            for dir in Direction::cardinals() {
                let npos = pos + dir.offset();
                if blocking.is_edge_blocked(map, terrain, pos, npos, DamageType::Smoke) {
                    continue;
                }
                if let Some(neighbor) = map.tile_mut(npos) {
                    neighbor.add_smoke(half);
                }
            }
        }
    }
}

/// Damage occupants of hazardous tiles, in unit-list order
///
/// Iteration follows the unit list, not the grid, so the RNG draw
/// sequence tracks the same insertion-order contract selection uses.
fn apply_hazard_damage(
    map: &BattleMap,
    units: &mut [BattleUnit],
    config: &RulesConfig,
    rng: &mut ChaCha8Rng,
    report: &mut HazardReport,
) {
    for unit in units.iter_mut() {
        unit.took_fire_damage = false;
    }

    for unit in units.iter_mut() {
        if unit.is_out() || !unit.position.is_valid() {
            continue;
        }

        // the thickest burning footprint tile sets the fire intensity
        let mut fire_smoke: Option<u8> = None;
        for dy in 0..i32::from(unit.size) {
            for dx in 0..i32::from(unit.size) {
                let Some(tile) = map.tile(unit.position + Position::new(dx, dy, 0)) else {
                    continue;
                };
                if tile.fire() > 0 && tile.smoke() > 0 {
                    fire_smoke = Some(fire_smoke.unwrap_or(0).max(tile.smoke()));
                }
            }
        }

        if let Some(smoke) = fire_smoke {
            // one hit per round, however many tiles the footprint burns on
            unit.took_fire_damage = true;
            resolve_hit(
                unit,
                Position::default(),
                i32::from(smoke),
                DamageType::Incendiary,
                true,
                config,
                rng,
            );
            report.units_burned += 1;

            let resist = unit.damage_modifiers.modifier(DamageType::Incendiary);
            let burn = dice::range(rng, 0, (config.burn_duration_factor * resist) as i32).max(0) as u8;
            if unit.fire < burn {
                unit.set_fire(burn);
            }
        } else if unit.size == 1 {
            let smoke = map.tile(unit.position).map(|t| t.smoke()).unwrap_or(0);
            if smoke == 0 {
                continue;
            }
            resolve_hit(
                unit,
                Position::default(),
                i32::from(smoke / SMOKE_STUN_DIVISOR + 1),
                DamageType::Smoke,
                true,
                config,
                rng,
            );
            report.units_choked += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battlescape::services::WallBlocking;
    use crate::battlescape::terrain::{PartRef, TerrainPart, TerrainSet};
    use crate::battlescape::unit::{Faction, UnitArchetype, UnitStats};
    use crate::core::types::UnitId;
    use rand::SeedableRng;

    const GRASS: u16 = 0;
    const CONCRETE: u16 = 1;
    const WALL: u16 = 2;
    const SHED: u16 = 3;
    const RUBBLE: u16 = 4;
    const DRUM: u16 = 5;

    fn terrain() -> TerrainLibrary {
        let mut set = TerrainSet::new("field");
        set.push(TerrainPart::named("grass").flammable(0, 3)); // GRASS: always lights
        set.push(TerrainPart::named("concrete")); // CONCRETE: fireproof
        set.push(TerrainPart::named("wall").wall()); // WALL
        set.push(
            TerrainPart::named("shed")
                .flammable(20, 2)
                .armored(8)
                .dies_into(RUBBLE),
        ); // SHED
        set.push(TerrainPart::named("rubble")); // RUBBLE
        set.push(TerrainPart::named("fuel drum").flammable(10, 5).explosive(60)); // DRUM
        let mut lib = TerrainLibrary::new();
        lib.push_set(set);
        lib
    }

    fn part(p: u16) -> PartRef {
        PartRef { part: p, set: 0 }
    }

    fn grass_field(width: u32, length: u32) -> (BattleMap, TerrainLibrary) {
        let lib = terrain();
        let mut map = BattleMap::new(width, length, 2);
        for y in 0..length as i32 {
            for x in 0..width as i32 {
                map.tile_mut(Position::new(x, y, 0))
                    .unwrap()
                    .set_part(PartSlot::Floor, Some(part(GRASS)));
            }
        }
        (map, lib)
    }

    fn unit_at(id: u32, position: Position) -> BattleUnit {
        let archetype = UnitArchetype::new(
            "trooper",
            "vest",
            UnitStats {
                tu: 50,
                stamina: 50,
                health: 30,
                bravery: 40,
                reactions: 40,
                firing: 40,
                throwing: 40,
                psi_skill: 0,
                psi_strength: 30,
                melee: 40,
                strength: 30,
            },
        );
        let mut unit = BattleUnit::from_archetype(UnitId(id), &archetype, Faction::Player);
        unit.position = position;
        unit
    }

    fn run(
        map: &mut BattleMap,
        lib: &TerrainLibrary,
        units: &mut [BattleUnit],
        rng: &mut ChaCha8Rng,
    ) -> HazardReport {
        run_hazard_pass(map, lib, units, &WallBlocking, &RulesConfig::default(), rng)
    }

    #[test]
    fn test_lone_fire_counts_down_and_burns_out() {
        let (mut map, lib) = grass_field(1, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let origin = Position::new(0, 0, 0);
        {
            let tile = map.tile_mut(origin).unwrap();
            tile.set_fire(2);
            tile.set_smoke(10);
        }

        let report = run(&mut map, &lib, &mut [], &mut rng);
        assert_eq!(map.tile(origin).unwrap().fire(), 1);
        assert_eq!(report.fires_burned_out, 0);

        let report = run(&mut map, &lib, &mut [], &mut rng);
        assert_eq!(map.tile(origin).unwrap().fire(), 0);
        assert_eq!(report.fires_burned_out, 1);
        // burnout clears smoke and eats the grass floor
        assert_eq!(map.tile(origin).unwrap().smoke(), 0);
        assert!(map.tile(origin).unwrap().has_no_floor());
        assert_eq!(report.parts_destroyed, 1);
        assert_eq!(report.settle, vec![origin]);
    }

    #[test]
    fn test_fire_spreads_to_flammable_neighbors() {
        let (mut map, lib) = grass_field(5, 5);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let center = Position::new(2, 2, 0);
        {
            let tile = map.tile_mut(center).unwrap();
            tile.set_fire(5);
            tile.set_smoke(15);
        }

        let report = run(&mut map, &lib, &mut [], &mut rng);
        // smoke 15, flammability 0: chance 15 - 0 + 15 = 30 per neighbor;
        // over one pass at least the counter is sane
        let lit: u32 = map.tiles().filter(|t| t.fire() > 0).count() as u32;
        assert_eq!(lit, 1 + report.fires_spread);
    }

    #[test]
    fn test_fireproof_floor_never_catches() {
        let lib = terrain();
        let mut map = BattleMap::new(3, 1, 1);
        for x in 0..3 {
            map.tile_mut(Position::new(x, 0, 0))
                .unwrap()
                .set_part(PartSlot::Floor, Some(part(CONCRETE)));
        }
        let center = Position::new(1, 0, 0);
        map.tile_mut(center).unwrap().set_fire(5);
        map.tile_mut(center).unwrap().set_smoke(15);

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..6 {
            run(&mut map, &lib, &mut [], &mut rng);
        }
        assert!(map.tile(Position::new(0, 0, 0)).unwrap().fire() == 0);
        assert!(map.tile(Position::new(2, 0, 0)).unwrap().fire() == 0);
    }

    #[test]
    fn test_wall_stops_fire_spread() {
        let (mut map, lib) = grass_field(2, 1);
        // wall on the west edge of the eastern tile
        map.tile_mut(Position::new(1, 0, 0))
            .unwrap()
            .set_part(PartSlot::WestWall, Some(part(WALL)));
        let origin = Position::new(0, 0, 0);
        map.tile_mut(origin).unwrap().set_fire(8);
        map.tile_mut(origin).unwrap().set_smoke(15);

        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..6 {
            run(&mut map, &lib, &mut [], &mut rng);
        }
        assert_eq!(map.tile(Position::new(1, 0, 0)).unwrap().fire(), 0);
    }

    #[test]
    fn test_burnout_swaps_ruined_variant() {
        let (mut map, lib) = grass_field(1, 1);
        let origin = Position::new(0, 0, 0);
        {
            let tile = map.tile_mut(origin).unwrap();
            tile.set_part(PartSlot::Floor, Some(part(CONCRETE)));
            tile.set_part(PartSlot::Object, Some(part(SHED)));
            tile.set_fire(1);
            tile.set_smoke(5);
        }
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        run(&mut map, &lib, &mut [], &mut rng);

        let tile = map.tile(origin).unwrap();
        assert_eq!(tile.part(PartSlot::Object), Some(part(RUBBLE)));
        // fireproof floor survives
        assert_eq!(tile.part(PartSlot::Floor), Some(part(CONCRETE)));
    }

    #[test]
    fn test_burnout_of_explosive_part_reports_pending_charge() {
        let lib = terrain();
        let mut map = BattleMap::new(1, 1, 1);
        let origin = Position::new(0, 0, 0);
        {
            let tile = map.tile_mut(origin).unwrap();
            tile.set_part(PartSlot::Object, Some(part(DRUM)));
            tile.set_fire(1);
            tile.set_smoke(6);
        }
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let report = run(&mut map, &lib, &mut [], &mut rng);

        assert_eq!(report.explosions_pending, vec![origin]);
        assert_eq!(map.tile_mut(origin).unwrap().take_pending_explosion(), 60);
    }

    #[test]
    fn test_smoke_decays_and_drifts() {
        let lib = terrain();
        let mut map = BattleMap::new(3, 3, 1);
        let center = Position::new(1, 1, 0);
        map.tile_mut(center).unwrap().set_smoke(9);

        let mut rng = ChaCha8Rng::seed_from_u64(6);
        run(&mut map, &lib, &mut [], &mut rng);

        // source decremented to 8, neighbors fed 8/2 = 4, averaged to 3
        assert_eq!(map.tile(center).unwrap().smoke(), 8);
        for npos in map.cardinal_neighbors(center) {
            assert_eq!(map.tile(npos).unwrap().smoke(), 3);
        }
    }

    #[test]
    fn test_smoke_does_not_drift_into_occupied_smoke() {
        let lib = terrain();
        let mut map = BattleMap::new(2, 1, 1);
        map.tile_mut(Position::new(0, 0, 0)).unwrap().set_smoke(9);
        // neighbor already smoky from an earlier round: left alone
        map.tile_mut(Position::new(1, 0, 0)).unwrap().set_smoke(2);

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        run(&mut map, &lib, &mut [], &mut rng);
        assert_eq!(map.tile(Position::new(1, 0, 0)).unwrap().smoke(), 1);
    }

    #[test]
    fn test_burning_tile_vents_smoke_upward() {
        let (mut map, lib) = grass_field(3, 3);
        let center = Position::new(1, 1, 0);
        {
            let tile = map.tile_mut(center).unwrap();
            tile.set_fire(5);
            tile.set_smoke(12);
        }
        // no floor above: smoke rises
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        run(&mut map, &lib, &mut [], &mut rng);
        assert!(map.tile(Position::new(1, 1, 1)).unwrap().smoke() > 0);
    }

    #[test]
    fn test_ceiling_stops_rising_smoke() {
        let (mut map, lib) = grass_field(3, 3);
        let center = Position::new(1, 1, 0);
        map.tile_mut(Position::new(1, 1, 1))
            .unwrap()
            .set_part(PartSlot::Floor, Some(part(CONCRETE)));
        {
            let tile = map.tile_mut(center).unwrap();
            tile.set_fire(5);
            tile.set_smoke(12);
        }
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        run(&mut map, &lib, &mut [], &mut rng);
        assert_eq!(map.tile(Position::new(1, 1, 1)).unwrap().smoke(), 0);
    }

    #[test]
    fn test_smoke_stuns_occupant() {
        let lib = terrain();
        let mut map = BattleMap::new(1, 1, 1);
        let origin = Position::new(0, 0, 0);
        map.tile_mut(origin).unwrap().set_smoke(8);
        let mut unit = unit_at(1, origin);
        map.tile_mut(origin).unwrap().set_occupant(Some(unit.id));

        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let mut units = vec![unit.clone()];
        let report = run(&mut map, &lib, &mut units, &mut rng);
        unit = units.pop().unwrap();

        assert_eq!(report.units_choked, 1);
        // smoke decayed to 7 before damage: 7/4 + 1 = 2 stun
        assert_eq!(unit.stun, 2);
        assert_eq!(unit.health, 30);
    }

    #[test]
    fn test_fire_damages_occupant_once_per_round() {
        let (mut map, lib) = grass_field(2, 1);
        let origin = Position::new(0, 0, 0);
        {
            let tile = map.tile_mut(origin).unwrap();
            tile.set_fire(5);
            tile.set_smoke(10);
        }
        let unit = unit_at(1, origin);
        map.tile_mut(origin).unwrap().set_occupant(Some(unit.id));
        // same unit backed onto a second burning tile
        let second = Position::new(1, 0, 0);
        map.tile_mut(second).unwrap().set_fire(5);
        map.tile_mut(second).unwrap().set_smoke(10);
        map.tile_mut(second).unwrap().set_occupant(Some(unit.id));

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut units = vec![unit];
        let report = run(&mut map, &lib, &mut units, &mut rng);

        assert_eq!(report.units_burned, 1);
        assert_eq!(units[0].health, 30 - 10);
        assert!(units[0].took_fire_damage);
    }

    #[test]
    fn test_unconscious_units_ignored_by_damage_pass() {
        let lib = terrain();
        let mut map = BattleMap::new(1, 1, 1);
        let origin = Position::new(0, 0, 0);
        map.tile_mut(origin).unwrap().set_smoke(8);
        let mut unit = unit_at(1, origin);
        unit.status = crate::battlescape::unit::UnitStatus::Unconscious;
        map.tile_mut(origin).unwrap().set_occupant(Some(unit.id));

        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let mut units = vec![unit];
        let report = run(&mut map, &lib, &mut units, &mut rng);
        assert_eq!(report.units_choked, 0);
        assert_eq!(units[0].stun, 0);
    }

    #[test]
    fn test_pass_is_deterministic_for_a_fixed_seed() {
        let build = || {
            let (mut map, lib) = grass_field(8, 8);
            let center = Position::new(4, 4, 0);
            map.tile_mut(center).unwrap().set_fire(6);
            map.tile_mut(center).unwrap().set_smoke(15);
            map.tile_mut(Position::new(1, 1, 0)).unwrap().set_smoke(9);
            (map, lib)
        };

        let (mut map_a, lib) = build();
        let (mut map_b, _) = build();
        let mut rng_a = ChaCha8Rng::seed_from_u64(77);
        let mut rng_b = ChaCha8Rng::seed_from_u64(77);

        for _ in 0..10 {
            run(&mut map_a, &lib, &mut [], &mut rng_a);
            run(&mut map_b, &lib, &mut [], &mut rng_b);
        }

        for idx in 0..map_a.tile_count() {
            let a = map_a.tile_at(idx).unwrap();
            let b = map_b.tile_at(idx).unwrap();
            assert_eq!(a.fire(), b.fire(), "fire diverged at {}", idx);
            assert_eq!(a.smoke(), b.smoke(), "smoke diverged at {}", idx);
            assert_eq!(a.part(PartSlot::Floor), b.part(PartSlot::Floor));
        }
    }
}
