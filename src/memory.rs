use ndarray::{Array2, Array3};

/// Either an array whose allocation may be reused, or nothing.
#[derive(Clone, Debug)]
pub enum Array3Recycle<T> {
    Empty,
    Recycle(Array3<T>),
}

impl<T> Array3Recycle<T>
where
    T: num::Zero + Clone,
{
    /// Returns the recycled array if it already has `required_dim`,
    /// otherwise a new zeroed one. Contents of a recycled array are kept.
    pub fn get(self, required_dim: (usize, usize, usize)) -> Array3<T> {
        match self {
            Self::Empty => Array3::<T>::zeros(required_dim),
            Self::Recycle(current) => {
                if current.dim() != required_dim {
                    Array3::<T>::zeros(required_dim)
                } else {
                    current
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl<T> From<Option<Array3<T>>> for Array3Recycle<T> {
    fn from(value: Option<Array3<T>>) -> Self {
        match value {
            Some(array) => Self::Recycle(array),
            None => Self::Empty,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Array2Recycle<T> {
    Empty,
    Recycle(Array2<T>),
}

impl<T> Array2Recycle<T>
where
    T: num::Zero + Clone,
{
    pub fn get(self, required_dim: (usize, usize)) -> Array2<T> {
        match self {
            Self::Empty => Array2::<T>::zeros(required_dim),
            Self::Recycle(current) => {
                if current.dim() != required_dim {
                    Array2::<T>::zeros(required_dim)
                } else {
                    current
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl<T> From<Option<Array2<T>>> for Array2Recycle<T> {
    fn from(value: Option<Array2<T>>) -> Self {
        match value {
            Some(array) => Self::Recycle(array),
            None => Self::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::{Array2Recycle, Array3Recycle};

    #[test]
    fn test_reuse() {
        let mut r = Array3Recycle::<f32>::Empty;
        assert!(r.is_empty());

        let mut array = r.get((4, 8, 3));
        array[(1, 2, 0)] = 5.0;
        r = Array3Recycle::Recycle(array);

        let array = r.get((4, 8, 3));
        assert_eq!(array[(1, 2, 0)], 5.0);

        let array = Array3Recycle::Recycle(array).get((2, 4, 3));
        assert_eq!(array.dim(), (2, 4, 3));
        assert_eq!(array[(1, 2, 0)], 0.0);
    }

    #[test]
    fn test_from_option() {
        let r: Array2Recycle<f32> = None.into();
        assert!(r.is_empty());

        let r: Array3Recycle<u8> = Some(Array3::zeros((1, 1, 1))).into();
        assert!(!r.is_empty());
    }
}
