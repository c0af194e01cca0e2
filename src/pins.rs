//! Board wiring: logical bus roles to RP2040 GPIO numbers

use crate::config::ConfigError;

/// Number of GPIOs in the RP2040's user bank
pub const BANK0_PINS: u8 = 30;

/// Width of the `ui_in` and `uio` groups
pub const GROUP_WIDTH: usize = 8;

/// A logical bus role
///
/// The bidirectional `uio` lines carry the QSPI bus shared by the flash and the two RAMs;
/// the associated constants name those roles.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    UiIn(u8),
    Uio(u8),
    ProjectClk,
    ProjectRstN,
}

impl Role {
    pub const FLASH_SEL: Role = Role::Uio(0);
    pub const QSPI_SD0: Role = Role::Uio(1);
    pub const QSPI_SD1: Role = Role::Uio(2);
    pub const QSPI_SCK: Role = Role::Uio(3);
    pub const QSPI_SD2: Role = Role::Uio(4);
    pub const QSPI_SD3: Role = Role::Uio(5);
    pub const RAM_A_SEL: Role = Role::Uio(6);
    pub const RAM_B_SEL: Role = Role::Uio(7);
}

const ENTRIES: usize = 2 * GROUP_WIDTH + 2;

/// Immutable role to pin table
///
/// Invariants, checked by [`PinRoleMap::new`]:
/// - every pin exists on the part;
/// - no two roles share a pin;
/// - the `uio` pins are consecutive and ascending,
///   since the sampler reads them as eight adjacent inputs starting at `uio[0]`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinRoleMap {
    ui_in: [u8; GROUP_WIDTH],
    uio: [u8; GROUP_WIDTH],
    project_clk: u8,
    project_rst_n: u8,
}

// The default table is part of the firmware image, reject a bad edit at build time
const _: () = assert!(PinRoleMap::BOARD.check().is_ok());

impl PinRoleMap {
    /// Wiring of the demo board
    pub const BOARD: PinRoleMap = PinRoleMap {
        ui_in: [9, 10, 11, 12, 17, 18, 19, 20],
        uio: [21, 22, 23, 24, 25, 26, 27, 28],
        project_clk: 0,
        project_rst_n: 1,
    };

    pub fn new(
        ui_in: [u8; GROUP_WIDTH],
        uio: [u8; GROUP_WIDTH],
        project_clk: u8,
        project_rst_n: u8,
    ) -> Result<Self, ConfigError> {
        let map = Self {
            ui_in,
            uio,
            project_clk,
            project_rst_n,
        };
        map.check()?;
        Ok(map)
    }

    const fn entries(&self) -> [(Role, u8); ENTRIES] {
        let mut out = [(Role::ProjectClk, 0); ENTRIES];
        let mut i = 0;
        while i < GROUP_WIDTH {
            out[i] = (Role::UiIn(i as u8), self.ui_in[i]);
            out[GROUP_WIDTH + i] = (Role::Uio(i as u8), self.uio[i]);
            i += 1;
        }
        out[2 * GROUP_WIDTH] = (Role::ProjectClk, self.project_clk);
        out[2 * GROUP_WIDTH + 1] = (Role::ProjectRstN, self.project_rst_n);
        out
    }

    const fn check(&self) -> Result<(), ConfigError> {
        let entries = self.entries();
        let mut i = 0;
        while i < ENTRIES {
            let (role, pin) = entries[i];
            if pin >= BANK0_PINS {
                return Err(ConfigError::PinOutOfRange { role, pin });
            }
            let mut j = 0;
            while j < i {
                if entries[j].1 == pin {
                    return Err(ConfigError::DuplicatePin {
                        pin,
                        first: entries[j].0,
                        second: role,
                    });
                }
                j += 1;
            }
            i += 1;
        }

        let mut i = 1;
        while i < GROUP_WIDTH {
            if self.uio[i] != self.uio[0] + i as u8 {
                return Err(ConfigError::NonContiguousSampleLines);
            }
            i += 1;
        }
        Ok(())
    }

    /// Physical pin for `role`
    ///
    /// Panics if a group index is out of range.
    pub fn pin(&self, role: Role) -> u8 {
        match role {
            Role::UiIn(i) => self.ui_in[usize::from(i)],
            Role::Uio(i) => self.uio[usize::from(i)],
            Role::ProjectClk => self.project_clk,
            Role::ProjectRstN => self.project_rst_n,
        }
    }

    /// Every role with its pin, inputs first
    pub fn roles(&self) -> impl Iterator<Item = (Role, u8)> {
        self.entries().into_iter()
    }

    pub fn project_clk(&self) -> u8 {
        self.project_clk
    }

    pub fn project_rst_n(&self) -> u8 {
        self.project_rst_n
    }

    /// First of the eight sampled pins
    pub fn sample_base(&self) -> u8 {
        self.uio[0]
    }

    /// Bit index within a sample of `pin`, if it is one of the sampled lines
    pub fn sample_bit(&self, pin: u8) -> Option<u8> {
        self.uio.iter().position(|&p| p == pin).map(|i| i as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn board_is_valid() {
        let map = PinRoleMap::new(
            [9, 10, 11, 12, 17, 18, 19, 20],
            [21, 22, 23, 24, 25, 26, 27, 28],
            0,
            1,
        )
        .unwrap();
        assert_eq!(map, PinRoleMap::BOARD);
        assert_eq!(map.pin(Role::QSPI_SCK), 24);
        assert_eq!(map.pin(Role::UiIn(7)), 20);
        assert_eq!(map.sample_base(), 21);
        assert_eq!(map.sample_bit(24), Some(3));
        assert_eq!(map.sample_bit(0), None);
        assert_eq!(map.roles().count(), 18);
    }

    #[test]
    fn duplicate_pin_is_rejected() {
        let err = PinRoleMap::new(
            [9, 10, 11, 12, 17, 18, 19, 20],
            [21, 22, 23, 24, 25, 26, 27, 28],
            0,
            0,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicatePin {
                pin: 0,
                first: Role::ProjectClk,
                second: Role::ProjectRstN,
            }
        );
    }

    #[test]
    fn clock_on_a_bus_pin_is_rejected() {
        let err = PinRoleMap::new(
            [9, 10, 11, 12, 17, 18, 19, 20],
            [21, 22, 23, 24, 25, 26, 27, 28],
            24,
            1,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePin { pin: 24, .. }));
    }

    #[test]
    fn out_of_range_pin_is_rejected() {
        let err = PinRoleMap::new(
            [9, 10, 11, 12, 17, 18, 19, 30],
            [21, 22, 23, 24, 25, 26, 27, 28],
            0,
            1,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::PinOutOfRange {
                role: Role::UiIn(7),
                pin: 30
            }
        );
    }

    #[test]
    fn scattered_bus_is_rejected() {
        let err = PinRoleMap::new(
            [9, 10, 11, 12, 17, 18, 19, 20],
            [21, 22, 23, 24, 25, 26, 28, 27],
            0,
            1,
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::NonContiguousSampleLines);
    }

    proptest! {
        #[test]
        fn accepted_iff_no_pin_is_shared(
            ui_in in proptest::array::uniform8(0u8..BANK0_PINS),
            base in 0u8..=(BANK0_PINS - GROUP_WIDTH as u8),
            clk in 0u8..BANK0_PINS,
            rst in 0u8..BANK0_PINS,
        ) {
            let uio: [u8; GROUP_WIDTH] = core::array::from_fn(|i| base + i as u8);
            let mut all = ui_in.to_vec();
            all.extend_from_slice(&uio);
            all.push(clk);
            all.push(rst);
            let mut distinct = all.clone();
            distinct.sort_unstable();
            distinct.dedup();
            let distinct = distinct.len() == all.len();

            match PinRoleMap::new(ui_in, uio, clk, rst) {
                Ok(map) => {
                    prop_assert!(distinct);
                    let mut seen = [false; BANK0_PINS as usize];
                    for (_, pin) in map.roles() {
                        prop_assert!(!seen[usize::from(pin)]);
                        seen[usize::from(pin)] = true;
                    }
                }
                Err(err) => {
                    prop_assert!(!distinct);
                    let is_duplicate = matches!(err, ConfigError::DuplicatePin { .. });
                    prop_assert!(is_duplicate);
                }
            }
        }

        #[test]
        fn shuffled_wiring_is_accepted(
            pins in Just((0..BANK0_PINS).collect::<Vec<u8>>()).prop_shuffle(),
            base in 0u8..=(BANK0_PINS - GROUP_WIDTH as u8),
        ) {
            let uio: [u8; GROUP_WIDTH] = core::array::from_fn(|i| base + i as u8);
            let rest: Vec<u8> = pins.into_iter().filter(|p| !uio.contains(p)).collect();
            let ui_in: [u8; GROUP_WIDTH] = core::array::from_fn(|i| rest[i]);
            let map = PinRoleMap::new(ui_in, uio, rest[8], rest[9]);
            prop_assert!(map.is_ok());
        }
    }
}
