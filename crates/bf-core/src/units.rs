//! SI quantities for the kettle plant, backed by `uom`.

use uom::si::f64::{
    HeatCapacity as UomHeatCapacity, Mass as UomMass, Power as UomPower,
    ThermodynamicTemperature as UomThermodynamicTemperature, Time as UomTime,
};

// Public canonical unit types (SI, f64)
pub type HeatCapacity = UomHeatCapacity;
pub type Mass = UomMass;
pub type Power = UomPower;
pub type Temperature = UomThermodynamicTemperature;
pub type Time = UomTime;

#[inline]
pub fn celsius(v: f64) -> Temperature {
    use uom::si::thermodynamic_temperature::degree_celsius;
    Temperature::new::<degree_celsius>(v)
}

#[inline]
pub fn to_celsius(t: Temperature) -> f64 {
    use uom::si::thermodynamic_temperature::degree_celsius;
    t.get::<degree_celsius>()
}

#[inline]
pub fn watts(v: f64) -> Power {
    use uom::si::power::watt;
    Power::new::<watt>(v)
}

#[inline]
pub fn to_watts(p: Power) -> f64 {
    use uom::si::power::watt;
    p.get::<watt>()
}

#[inline]
pub fn kg(v: f64) -> Mass {
    use uom::si::mass::kilogram;
    Mass::new::<kilogram>(v)
}

#[inline]
pub fn s(v: f64) -> Time {
    use uom::si::time::second;
    Time::new::<second>(v)
}

#[inline]
pub fn to_seconds(t: Time) -> f64 {
    use uom::si::time::second;
    t.get::<second>()
}

#[inline]
pub fn joules_per_kelvin(v: f64) -> HeatCapacity {
    use uom::si::heat_capacity::joule_per_kelvin;
    HeatCapacity::new::<joule_per_kelvin>(v)
}

#[inline]
pub fn to_joules_per_kelvin(c: HeatCapacity) -> f64 {
    use uom::si::heat_capacity::joule_per_kelvin;
    c.get::<joule_per_kelvin>()
}

pub mod constants {
    use super::*;

    /// Specific heat of liquid water near brewing temperatures.
    pub const WATER_CP_J_PER_KG_K: f64 = 4_186.0;

    /// Lumped heat capacity of a water charge of the given mass.
    #[inline]
    pub fn water_heat_capacity(mass: Mass) -> HeatCapacity {
        joules_per_kelvin(super::to_kg(mass) * WATER_CP_J_PER_KG_K)
    }
}

#[inline]
pub fn to_kg(m: Mass) -> f64 {
    use uom::si::mass::kilogram;
    m.get::<kilogram>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_read_back() {
        assert_eq!(to_watts(watts(2_000.0)), 2_000.0);
        assert_eq!(to_kg(kg(20.0)), 20.0);
        assert_eq!(to_seconds(s(30.0)), 30.0);
        assert_eq!(to_joules_per_kelvin(joules_per_kelvin(83_720.0)), 83_720.0);
    }

    #[test]
    fn celsius_round_trip() {
        let t = celsius(65.0);
        assert!((to_celsius(t) - 65.0).abs() < 1e-9);
    }

    #[test]
    fn water_charge_heat_capacity() {
        let c = constants::water_heat_capacity(kg(20.0));
        assert!((to_joules_per_kelvin(c) - 83_720.0).abs() < 1e-6);
    }
}
