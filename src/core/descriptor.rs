use serde::{Deserialize, Serialize};

/// Fixed-length numeric summary of one detected face.
///
/// Descriptors come out of a [`DescriptorExtractor`](crate::core::DescriptorExtractor)
/// or back out of the enrollment store; nothing else should build them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor(Vec<f32>);

impl Descriptor {
    pub fn from_vec(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Euclidean distance, or `None` when the lengths differ.
    pub fn distance(&self, other: &Descriptor) -> Option<f32> {
        if self.len() != other.len() {
            return None;
        }
        Some(euclidean_distance(&self.0, &other.0))
    }

    /// Scales to unit length in place. Zero vectors are left alone.
    pub fn normalize(&mut self) {
        let norm: f32 = self.0.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut self.0 {
                *value /= norm;
            }
        }
    }
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let d = Descriptor::from_vec(vec![0.3, -1.2, 4.0, 0.0]);
        assert_eq!(d.distance(&d), Some(0.0));
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Descriptor::from_vec(vec![0.0, 0.0]);
        let b = Descriptor::from_vec(vec![3.0, 4.0]);
        assert_eq!(a.distance(&b), Some(5.0));
    }

    #[test]
    fn mismatched_lengths_have_no_distance() {
        let a = Descriptor::from_vec(vec![1.0, 0.0]);
        let b = Descriptor::from_vec(vec![1.0, 0.0, 0.0]);
        assert_eq!(a.distance(&b), None);
    }

    #[test]
    fn normalize_produces_unit_length() {
        let mut d = Descriptor::from_vec(vec![3.0, 4.0]);
        d.normalize();
        assert!((d.as_slice()[0] - 0.6).abs() < 1e-6);
        assert!((d.as_slice()[1] - 0.8).abs() < 1e-6);

        let mut zero = Descriptor::from_vec(vec![0.0; 4]);
        zero.normalize();
        assert_eq!(zero.as_slice(), &[0.0; 4]);
    }

    #[test]
    fn serializes_as_plain_array() {
        let d = Descriptor::from_vec(vec![0.25, -0.5]);
        assert_eq!(serde_json::to_string(&d).unwrap(), "[0.25,-0.5]");
    }
}
