use crate::pricing::SurgePolicy;
use crate::types::TripRequest;

/// Unrounded pricing figures for one trip. Rounding happens only when the
/// response is serialized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FarePricingResult {
    pub fair_taxi_price: f64,
    pub model_base_price: f64,
    /// Signed: positive when the app price exceeds the fair price.
    pub hidden_fee_vs_fair: f64,
    pub final_ai_fare: f64,
    /// Signed.
    pub surge_fee: f64,
    pub surge_multiplier: f64,
}

impl FarePricingResult {
    pub fn is_finite(&self) -> bool {
        [
            self.fair_taxi_price,
            self.model_base_price,
            self.hidden_fee_vs_fair,
            self.final_ai_fare,
            self.surge_fee,
            self.surge_multiplier,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

pub struct HiddenFeeCalculator;

impl HiddenFeeCalculator {
    pub fn reconcile(
        fair_price: f64,
        model_price: f64,
        surge: Option<&dyn SurgePolicy>,
        trip: &TripRequest,
    ) -> FarePricingResult {
        let final_ai_fare = match surge {
            None => model_price,
            Some(policy) => {
                let f = policy.final_fare(model_price, trip);
                if f.is_finite() && f >= 0.0 {
                    f
                } else {
                    tracing::warn!("surge policy returned unusable fare {}; ignoring surge", f);
                    model_price
                }
            }
        };

        let surge_multiplier = if surge.is_none() || model_price == 0.0 {
            1.0
        } else {
            final_ai_fare / model_price
        };

        FarePricingResult {
            fair_taxi_price: fair_price,
            model_base_price: model_price,
            hidden_fee_vs_fair: model_price - fair_price,
            final_ai_fare,
            surge_fee: final_ai_fare - model_price,
            surge_multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::TieredSurge;
    use crate::types::{CarType, Coord, Weather};

    struct Flat(f64);

    impl SurgePolicy for Flat {
        fn final_fare(&self, _model_price: f64, _trip: &TripRequest) -> f64 {
            self.0
        }
    }

    fn trip() -> TripRequest {
        TripRequest {
            pickup: Coord { lat: 40.75, lng: -73.99 },
            dropoff: Coord { lat: 40.71, lng: -74.00 },
            distance_km: Some(4.5),
            traffic_level: 70,
            weather: Weather::Sunny,
            car_type: CarType::Comfort,
            hour: 17,
            day_of_week: 4,
        }
    }

    #[test]
    fn no_surge_passes_model_price_through() {
        let r = HiddenFeeCalculator::reconcile(14.0, 18.5, None, &trip());
        assert_eq!(r.hidden_fee_vs_fair, 4.5);
        assert_eq!(r.final_ai_fare, 18.5);
        assert_eq!(r.surge_fee, 0.0);
        assert_eq!(r.surge_multiplier, 1.0);
    }

    #[test]
    fn hidden_fee_is_signed() {
        let r = HiddenFeeCalculator::reconcile(20.0, 12.0, None, &trip());
        assert_eq!(r.hidden_fee_vs_fair, -8.0);
    }

    #[test]
    fn surge_policy_scales_final_fare() {
        let r = HiddenFeeCalculator::reconcile(14.0, 20.0, Some(&TieredSurge), &trip());
        assert!((r.final_ai_fare - 26.0).abs() < 1e-9);
        assert!((r.surge_fee - 6.0).abs() < 1e-9);
        assert!((r.surge_multiplier - 1.3).abs() < 1e-12);
        assert_eq!(r.hidden_fee_vs_fair, 6.0);
    }

    #[test]
    fn zero_model_price_guards_multiplier() {
        let r = HiddenFeeCalculator::reconcile(5.0, 0.0, Some(&Flat(7.0)), &trip());
        assert_eq!(r.surge_multiplier, 1.0);
        assert_eq!(r.final_ai_fare, 7.0);
        assert_eq!(r.surge_fee, 7.0);
    }

    #[test]
    fn discount_policy_gives_negative_surge_fee() {
        let r = HiddenFeeCalculator::reconcile(10.0, 20.0, Some(&Flat(18.0)), &trip());
        assert_eq!(r.surge_fee, -2.0);
        assert_eq!(r.surge_multiplier, 0.9);
    }

    #[test]
    fn overflowing_difference_is_detected() {
        let ok = HiddenFeeCalculator::reconcile(14.0, 18.5, None, &trip());
        assert!(ok.is_finite());

        // fair near -MAX cannot come from the ensemble, but the check must still see it
        let r = HiddenFeeCalculator::reconcile(-f64::MAX, f64::MAX, None, &trip());
        assert!(r.hidden_fee_vs_fair.is_infinite());
        assert!(!r.is_finite());
    }

    #[test]
    fn unusable_policy_output_is_ignored() {
        for bad in [f64::NAN, f64::INFINITY, -1.0] {
            let r = HiddenFeeCalculator::reconcile(10.0, 20.0, Some(&Flat(bad)), &trip());
            assert_eq!(r.final_ai_fare, 20.0);
            assert_eq!(r.surge_fee, 0.0);
            assert_eq!(r.surge_multiplier, 1.0);
        }
    }
}
