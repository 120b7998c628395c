//! The battle state and turn controller
//!
//! Owns the canonical unit list, item list and tile grid, sequences
//! faction turns, and triggers the end-of-round passes. Unit list order
//! is insertion order and is an observable contract: selection scans and
//! hazard damage both follow it.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::battlescape::hazard::{self, HazardReport};
use crate::battlescape::item::{BattleItem, InventorySlot, ItemCatalog};
use crate::battlescape::map::BattleMap;
use crate::battlescape::services::ServiceRegistry;
use crate::battlescape::terrain::TerrainLibrary;
use crate::battlescape::unit::{BattleUnit, Faction, UnitArchetype, UnitStatus};
use crate::core::config::RulesConfig;
use crate::core::error::{BattlescapeError, Result};
use crate::core::types::{Direction, ItemId, Position, TurnNumber, UnitId};

/// Time-unit reservation for opportunity fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TuReservation {
    #[default]
    None,
    Snap,
    Aimed,
    Auto,
}

/// Noteworthy happenings from one faction transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    RoundStarted { turn: TurnNumber },
    UnitRevived { unit: UnitId },
    FuseExpired { item: ItemId },
}

/// Result of ending a faction's turn
#[derive(Debug)]
pub struct TurnSummary {
    /// The faction now in control
    pub side: Faction,
    pub new_round: bool,
    pub hazard: Option<HazardReport>,
    pub events: Vec<TurnEvent>,
}

/// The whole tactical battle
pub struct Battlescape {
    pub config: RulesConfig,
    pub terrain: TerrainLibrary,
    pub item_rules: ItemCatalog,
    pub(crate) map: BattleMap,
    pub(crate) units: Vec<BattleUnit>,
    pub(crate) items: Vec<BattleItem>,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) rng_seed: u64,
    pub(crate) turn: TurnNumber,
    pub(crate) side: Faction,
    pub(crate) selected: Option<UnitId>,
    pub(crate) before_game: bool,
    pub(crate) cheating: bool,
    pub tu_reservation: TuReservation,
    pub mission_type: String,
    pub global_shade: u8,
    pub objectives_needed: u32,
    pub objectives_destroyed: u32,
    pub(crate) next_player_id: u32,
    pub(crate) next_spawn_id: u32,
    pub(crate) next_item_id: u32,
}

impl Battlescape {
    pub fn new(
        map: BattleMap,
        terrain: TerrainLibrary,
        item_rules: ItemCatalog,
        config: RulesConfig,
        seed: u64,
    ) -> Self {
        Self {
            config,
            terrain,
            item_rules,
            map,
            units: Vec::new(),
            items: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            rng_seed: seed,
            turn: 1,
            side: Faction::Player,
            selected: None,
            before_game: false,
            cheating: false,
            tu_reservation: TuReservation::None,
            mission_type: String::new(),
            global_shade: 0,
            objectives_needed: 0,
            objectives_destroyed: 0,
            next_player_id: 1,
            next_spawn_id: UnitId::PLAYER_CEILING,
            next_item_id: 1,
        }
    }

    // === ACCESS ===

    pub fn map(&self) -> &BattleMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut BattleMap {
        &mut self.map
    }

    pub fn turn(&self) -> TurnNumber {
        self.turn
    }

    pub fn side(&self) -> Faction {
        self.side
    }

    pub fn is_before_game(&self) -> bool {
        self.before_game
    }

    /// Placement phase toggle; while set, no turn-order effects apply
    pub fn set_before_game(&mut self, before_game: bool) {
        self.before_game = before_game;
    }

    pub fn is_cheating(&self) -> bool {
        self.cheating
    }

    pub fn seed(&self) -> u64 {
        self.rng_seed
    }

    /// The shared RNG stream; action resolution rolls draw from here too
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn units(&self) -> &[BattleUnit] {
        &self.units
    }

    pub fn units_mut(&mut self) -> &mut [BattleUnit] {
        &mut self.units
    }

    pub fn unit(&self, id: UnitId) -> Option<&BattleUnit> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut BattleUnit> {
        self.units.iter_mut().find(|u| u.id == id)
    }

    pub fn items(&self) -> &[BattleItem] {
        &self.items
    }

    pub fn item(&self, id: ItemId) -> Option<&BattleItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut BattleItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    pub fn any_active_units(&self, faction: Faction) -> bool {
        self.units.iter().any(|u| u.faction == faction && !u.is_out())
    }

    // === ROSTER ===

    /// Add a unit to the list, off-grid; place it with [`Self::place_unit`]
    pub fn add_unit(&mut self, archetype: &UnitArchetype, faction: Faction) -> UnitId {
        let id = if faction == Faction::Player {
            let id = UnitId(self.next_player_id);
            self.next_player_id += 1;
            id
        } else {
            let id = UnitId(self.next_spawn_id);
            self.next_spawn_id += 1;
            id
        };
        self.units
            .push(BattleUnit::from_archetype(id, archetype, faction));
        id
    }

    /// Add and place in one step; None when the spot is taken
    pub fn spawn_unit_at(
        &mut self,
        archetype: &UnitArchetype,
        faction: Faction,
        position: Position,
    ) -> Option<UnitId> {
        if !self.footprint_free(position, archetype.size, None) {
            return None;
        }
        let id = self.add_unit(archetype, faction);
        self.place_unit(id, position);
        Some(id)
    }

    fn footprint_free(&self, position: Position, size: u8, allow: Option<UnitId>) -> bool {
        for dy in 0..i32::from(size) {
            for dx in 0..i32::from(size) {
                let at = position + Position::new(dx, dy, 0);
                match self.map.tile(at) {
                    Some(tile) => match tile.occupant() {
                        Some(id) if Some(id) != allow => return false,
                        _ => {}
                    },
                    None => return false,
                }
            }
        }
        true
    }

    /// Move a unit's footprint to a new origin tile
    ///
    /// Every footprint tile stores the unit reference; the origin tile is
    /// the authoritative one for position. Returns false and changes
    /// nothing if any target tile is missing or occupied by someone else.
    pub fn place_unit(&mut self, id: UnitId, position: Position) -> bool {
        let Some(size) = self.unit(id).map(|u| u.size) else {
            return false;
        };
        if !self.footprint_free(position, size, Some(id)) {
            return false;
        }
        self.clear_footprint(id);
        for dy in 0..i32::from(size) {
            for dx in 0..i32::from(size) {
                if let Some(tile) = self.map.tile_mut(position + Position::new(dx, dy, 0)) {
                    tile.set_occupant(Some(id));
                }
            }
        }
        if let Some(unit) = self.unit_mut(id) {
            unit.set_position(position);
        }
        true
    }

    /// Remove a unit's tile references (death, unconsciousness, exit)
    pub fn clear_footprint(&mut self, id: UnitId) {
        let Some((origin, size)) = self.unit(id).map(|u| (u.position, u.size)) else {
            return;
        };
        if !origin.is_valid() {
            return;
        }
        for dy in 0..i32::from(size) {
            for dx in 0..i32::from(size) {
                if let Some(tile) = self.map.tile_mut(origin + Position::new(dx, dy, 0)) {
                    if tile.occupant() == Some(id) {
                        tile.set_occupant(None);
                    }
                }
            }
        }
    }

    /// Swap a unit for a different archetype in place (zombification)
    ///
    /// The old record stays on the list as IgnoreMe and loses its grid
    /// presence; the replacement takes its position and facing.
    pub fn convert_unit(
        &mut self,
        id: UnitId,
        archetype: &UnitArchetype,
        faction: Faction,
    ) -> Result<UnitId> {
        let (position, direction) = {
            let unit = self.unit(id).ok_or(BattlescapeError::UnitNotFound(id))?;
            (unit.position, unit.direction)
        };
        self.clear_footprint(id);
        if let Some(old) = self.unit_mut(id) {
            old.status = UnitStatus::IgnoreMe;
            old.set_position(Position::INVALID);
        }
        if self.selected == Some(id) {
            self.selected = None;
        }

        let new_id = self.add_unit(archetype, faction);
        if let Some(unit) = self.unit_mut(new_id) {
            unit.direction = direction;
        }
        if position.is_valid() {
            self.place_unit(new_id, position);
        }
        tracing::debug!(old = id.0, new = new_id.0, "unit converted");
        Ok(new_id)
    }

    // === ITEMS ===

    /// Create an item of a known rule; unknown rules are a hard error
    pub fn add_item(&mut self, rule_id: &str) -> Result<ItemId> {
        if self.item_rules.get(rule_id).is_none() {
            return Err(BattlescapeError::UnknownItemRule(rule_id.to_string()));
        }
        let id = ItemId(self.next_item_id);
        self.next_item_id += 1;
        self.items.push(BattleItem::new(id, rule_id));
        Ok(id)
    }

    /// Hand an item to a unit at a given slot; false on conflict
    pub fn give_item_to(
        &mut self,
        item_id: ItemId,
        unit_id: UnitId,
        slot: InventorySlot,
        x: u8,
        y: u8,
    ) -> bool {
        let Some(item_idx) = self.items.iter().position(|i| i.id == item_id) else {
            return false;
        };
        let Some(unit) = self.unit(unit_id) else {
            return false;
        };
        if !unit.has_inventory_capability {
            return false;
        }
        let carried = unit.inventory.clone();
        let candidate = &self.items[item_idx];
        for other_id in carried {
            if other_id == item_id {
                continue;
            }
            let Some(other) = self.item(other_id) else {
                continue;
            };
            if crate::battlescape::item::placement_conflicts(
                &self.item_rules,
                (candidate, slot, x, y),
                other,
            ) {
                return false;
            }
        }

        // detach from wherever it was
        self.detach_item(item_id);
        self.items[item_idx].move_to_owner(unit_id, slot, x, y);
        if let Some(unit) = self.unit_mut(unit_id) {
            unit.inventory.push(item_id);
        }
        true
    }

    /// Drop an item onto a tile; false when the tile does not exist
    pub fn drop_item_at(&mut self, item_id: ItemId, position: Position) -> bool {
        if self.map.tile(position).is_none() {
            return false;
        }
        let Some(item_idx) = self.items.iter().position(|i| i.id == item_id) else {
            return false;
        };
        self.detach_item(item_id);
        let enemy_turn = self.side != Faction::Player;
        let item = &mut self.items[item_idx];
        item.move_to_tile(position);
        item.dropped_on_enemy_turn = enemy_turn;
        if let Some(tile) = self.map.tile_mut(position) {
            tile.add_item(item_id);
        }
        true
    }

    /// Unlink an item from its current owner or tile
    fn detach_item(&mut self, item_id: ItemId) {
        let Some(item) = self.item(item_id) else {
            return;
        };
        let owner = item.owner();
        let tile = item.tile();
        if let Some(owner) = owner {
            if let Some(unit) = self.unit_mut(owner) {
                unit.inventory.retain(|&i| i != item_id);
            }
        }
        if let Some(position) = tile {
            if let Some(tile) = self.map.tile_mut(position) {
                tile.remove_item(item_id);
            }
        }
    }

    /// Load ammo into a weapon; false on incompatibility or bad ids
    pub fn load_ammo_into(&mut self, weapon_id: ItemId, ammo_id: ItemId) -> bool {
        let Some(weapon) = self.item(weapon_id) else {
            return false;
        };
        let Some(ammo) = self.item(ammo_id) else {
            return false;
        };
        if weapon.ammo.is_some() {
            return false;
        }
        if !self
            .item_rules
            .ammo_compatible(&weapon.rule_id, &ammo.rule_id)
        {
            return false;
        }
        self.detach_item(ammo_id);
        if let Some(ammo) = self.item_mut(ammo_id) {
            ammo.ammo_in_weapon = true;
        }
        if let Some(weapon) = self.item_mut(weapon_id) {
            weapon.ammo = Some(ammo_id);
        }
        true
    }

    pub fn items_with_expired_fuses(&self) -> Vec<ItemId> {
        self.items
            .iter()
            .filter(|i| i.fuse_expired())
            .map(|i| i.id)
            .collect()
    }

    // === SELECTION ===

    pub fn selected_unit(&self) -> Option<UnitId> {
        self.selected
    }

    /// Select a specific unit; false if it is not selectable at all
    pub fn select_unit(&mut self, id: UnitId) -> bool {
        let Some(unit) = self.unit(id) else {
            return false;
        };
        if unit.is_out() {
            return false;
        }
        self.selected = Some(id);
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Scan forward in list order for the next selectable player unit
    pub fn select_next_player_unit(
        &mut self,
        check_reselect: bool,
        check_inventory: bool,
    ) -> Option<UnitId> {
        self.scan_selection(Faction::Player, true, check_reselect, check_inventory)
    }

    /// Scan backward in list order for the previous selectable player unit
    pub fn select_previous_player_unit(
        &mut self,
        check_reselect: bool,
        check_inventory: bool,
    ) -> Option<UnitId> {
        self.scan_selection(Faction::Player, false, check_reselect, check_inventory)
    }

    fn scan_selection(
        &mut self,
        faction: Faction,
        forward: bool,
        check_reselect: bool,
        check_inventory: bool,
    ) -> Option<UnitId> {
        let len = self.units.len();
        if len == 0 {
            self.selected = None;
            return None;
        }
        let current = self
            .selected
            .and_then(|id| self.units.iter().position(|u| u.id == id));
        // with nothing selected, a forward scan starts at the list head
        let start = current.unwrap_or(if forward { len - 1 } else { 0 });

        for step in 1..=len {
            let idx = if forward {
                (start + step) % len
            } else {
                (start + len - (step % len)) % len
            };
            let unit = &self.units[idx];
            if unit.is_selectable(faction, check_reselect, check_inventory) {
                self.selected = Some(unit.id);
                return self.selected;
            }
        }
        self.selected = None;
        None
    }

    // === TURN MACHINE ===

    /// Hand control to the next faction, starting a new round when the
    /// cycle completes
    ///
    /// Rotation is Player -> Hostile -> Neutral -> Player, with the
    /// Neutral phase skipped outright when no active neutral units exist.
    pub fn end_faction_turn(&mut self, services: &mut ServiceRegistry) -> TurnSummary {
        let mut summary = TurnSummary {
            side: self.side,
            new_round: false,
            hazard: None,
            events: Vec::new(),
        };

        let next = match self.side {
            Faction::Player => Faction::Hostile,
            Faction::Hostile => {
                if self.any_active_units(Faction::Neutral) {
                    Faction::Neutral
                } else {
                    self.begin_new_round(services, &mut summary);
                    Faction::Player
                }
            }
            Faction::Neutral => {
                self.begin_new_round(services, &mut summary);
                Faction::Player
            }
        };
        self.side = next;
        summary.side = next;
        tracing::debug!(side = ?next, turn = self.turn, "faction turn");

        if !self.before_game {
            let config = &self.config;
            let rng = &mut self.rng;
            for unit in self.units.iter_mut().filter(|u| u.faction == next) {
                unit.prepare_new_turn(config, rng, true);
            }
        }

        summary
    }

    /// Turn counter, hazard pass, revival, FOV, AI cheat flag, selection
    fn begin_new_round(&mut self, services: &mut ServiceRegistry, summary: &mut TurnSummary) {
        self.turn += 1;
        summary.new_round = true;
        summary.events.push(TurnEvent::RoundStarted { turn: self.turn });
        tracing::debug!(turn = self.turn, "round begins");

        self.tick_fuses(&mut summary.events);

        let report = hazard::run_hazard_pass(
            &mut self.map,
            &self.terrain,
            &mut self.units,
            services.blocking.as_ref(),
            &self.config,
            &mut self.rng,
        );
        self.objectives_destroyed += report.objectives_destroyed;
        for position in report.settle.iter().copied() {
            self.settle(position);
        }
        summary.hazard = Some(report);

        for unit in self.run_revival_pass(services) {
            summary.events.push(TurnEvent::UnitRevived { unit });
        }

        services.visibility.recalculate_fov(self);

        if self.turn >= self.config.cheat_turn_threshold && !self.cheating {
            self.cheating = true;
            tracing::debug!(turn = self.turn, "AI information cheat enabled");
        }

        // keep the previous selection when it is still eligible
        let keep = self
            .selected
            .and_then(|id| self.unit(id))
            .map(|u| u.is_selectable(Faction::Player, true, false))
            .unwrap_or(false);
        if !keep {
            self.scan_selection(Faction::Player, true, true, false);
        }
    }

    fn tick_fuses(&mut self, events: &mut Vec<TurnEvent>) {
        for item in &mut self.items {
            if item.fuse > 0 {
                item.tick_fuse();
                if item.fuse_expired() {
                    events.push(TurnEvent::FuseExpired { item: item.id });
                }
            }
        }
    }

    /// Let the AI strategy act for every eligible unit of the active side
    pub fn run_ai_turn(&mut self, services: &mut ServiceRegistry) {
        if self.side == Faction::Player {
            return;
        }
        let side = self.side;
        let ids: Vec<UnitId> = self
            .units
            .iter()
            .filter(|u| {
                u.faction == side
                    && u.is_conscious()
                    && !matches!(u.status, UnitStatus::Panicking | UnitStatus::Berserk)
            })
            .map(|u| u.id)
            .collect();
        for id in ids {
            // eligibility can lapse mid-loop (fire, reaction casualties)
            let still_eligible = self.unit(id).map(|u| u.is_conscious()).unwrap_or(false);
            if still_eligible {
                services.ai.act(self, id);
            }
        }
    }

    // === COLLAPSE & REVIVAL ===

    /// Finalize a finished collapse: free the grid and leave a body item
    pub fn settle_collapse(&mut self, id: UnitId) {
        let Some(unit) = self.unit(id) else {
            return;
        };
        if !matches!(unit.status, UnitStatus::Dead | UnitStatus::Unconscious) {
            return;
        }
        let position = unit.position;
        let body_rule = unit.body_item_rule.clone();
        self.clear_footprint(id);

        let Some(rule) = body_rule else {
            return;
        };
        if !position.is_valid() || self.items.iter().any(|i| i.body_of == Some(id)) {
            return;
        }
        if let Ok(item_id) = self.add_item(&rule) {
            if let Some(item) = self.item_mut(item_id) {
                item.body_of = Some(id);
                item.move_to_tile(position);
            }
            if let Some(tile) = self.map.tile_mut(position) {
                tile.add_item(item_id);
            }
        }
    }

    /// Stand eligible unconscious units back up
    ///
    /// Eligible: size 1, unconscious, stun below current health, health
    /// above zero. Runs once per round boundary and is idempotent in
    /// between.
    pub fn run_revival_pass(&mut self, services: &mut ServiceRegistry) -> Vec<UnitId> {
        let mut revived = Vec::new();
        let candidates: Vec<UnitId> = self
            .units
            .iter()
            .filter(|u| {
                u.size == 1
                    && u.status == UnitStatus::Unconscious
                    && u.stun < u.health
                    && u.health > 0
            })
            .map(|u| u.id)
            .collect();

        for id in candidates {
            let Some((spot, floating)) = self.find_revival_spot(id, services) else {
                continue;
            };
            if let Some(unit) = self.unit_mut(id) {
                unit.status = if floating {
                    UnitStatus::Flying
                } else {
                    UnitStatus::Standing
                };
                unit.kneeled = false;
                unit.floating = floating;
            }
            self.place_unit(id, spot);
            self.remove_body_item(id);
            services.visibility.calculate_fov(self, id);
            services.visibility.calculate_unit_lighting(self);
            tracing::debug!(unit = id.0, "unit regained consciousness");
            revived.push(id);
        }
        revived
    }

    /// 8-direction search radiating from the unit's original position,
    /// same tile first; flyers may also probe straight up
    fn find_revival_spot(
        &self,
        id: UnitId,
        services: &ServiceRegistry,
    ) -> Option<(Position, bool)> {
        let unit = self.unit(id)?;
        let origin = unit.position;
        if !origin.is_valid() {
            return None;
        }

        let mut candidates = Vec::with_capacity(9);
        candidates.push(origin);
        for dir in Direction::all() {
            candidates.push(origin + dir.offset());
        }

        for candidate in candidates {
            if !self.map.contains(candidate) {
                continue;
            }
            if services
                .blocking
                .is_blocked(&self.map, &self.terrain, candidate, unit.size)
            {
                continue;
            }
            let has_floor = self
                .map
                .tile(candidate)
                .map(|t| !t.has_no_floor())
                .unwrap_or(false)
                || candidate.z == 0;
            if has_floor {
                return Some((candidate, false));
            }
            if unit.can_fly {
                return Some((candidate, true));
            }
        }

        if unit.can_fly {
            let probe = origin + Position::new(0, 0, 1);
            let open_above = self
                .map
                .tile(probe)
                .map(|t| t.has_no_floor())
                .unwrap_or(false);
            if open_above
                && !services
                    .blocking
                    .is_blocked(&self.map, &self.terrain, probe, unit.size)
            {
                return Some((probe, true));
            }
        }
        None
    }

    fn remove_body_item(&mut self, id: UnitId) {
        let Some(index) = self.items.iter().position(|i| i.body_of == Some(id)) else {
            return;
        };
        let item = self.items.remove(index);
        if let Some(position) = item.tile() {
            if let Some(tile) = self.map.tile_mut(position) {
                tile.remove_item(item.id);
            }
        }
        if let Some(owner) = item.owner() {
            if let Some(unit) = self.unit_mut(owner) {
                unit.inventory.retain(|&i| i != item.id);
            }
        }
    }

    // === GRAVITY ===

    /// Settle items and any grounded occupant after terrain vanished
    pub fn settle(&mut self, position: Position) {
        let destination = self.map.drop_point(position);
        if destination == position {
            return;
        }

        let moved: Vec<ItemId> = self
            .map
            .tile_mut(position)
            .map(|t| t.drain_items())
            .unwrap_or_default();
        if let Some(tile) = self.map.tile_mut(destination) {
            for id in &moved {
                tile.add_item(*id);
            }
        }
        for id in moved {
            if let Some(item) = self.item_mut(id) {
                item.move_to_tile(destination);
            }
        }

        let occupant = self.map.tile(position).and_then(|t| t.occupant());
        if let Some(id) = occupant {
            let falls = self
                .unit(id)
                .map(|u| !u.can_fly && !u.floating && u.position == position)
                .unwrap_or(false);
            if falls {
                self.place_unit(id, destination);
            }
        }
    }
}
