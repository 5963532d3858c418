use super::vectorizer::FeatureVector;

/// Dense, symmetric cosine-similarity matrix in row-major order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimilarityMatrix {
    dimension: usize,
    scores: Vec<f64>,
}

impl SimilarityMatrix {
    /// O(n² · d). The diagonal is pinned to 1.0 and each off-diagonal pair is computed once and
    /// mirrored, so `get(i, j) == get(j, i)` holds bit for bit.
    pub fn from_vectors(vectors: &[FeatureVector]) -> Self {
        let dimension = vectors.len();
        let mut scores = vec![0.0; dimension * dimension];

        for row in 0..dimension {
            scores[row * dimension + row] = 1.0;
            for column in (row + 1)..dimension {
                let score = vectors[row].dot(&vectors[column]).clamp(0.0, 1.0);
                scores[row * dimension + column] = score;
                scores[column * dimension + row] = score;
            }
        }

        Self { dimension, scores }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn get(&self, row: usize, column: usize) -> f64 {
        self.scores[row * self.dimension + column]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.dimension;
        &self.scores[start..start + self.dimension]
    }
}

#[cfg(test)]
mod tests {
    use super::SimilarityMatrix;
    use crate::recommend::vectorizer::TfIdfVectorizer;

    #[test]
    fn matrix_is_symmetric_with_unit_diagonal() {
        let documents = vec![
            "washed denim jacket".to_string(),
            "raw denim jeans".to_string(),
            "cotton graphic tee".to_string(),
            "the of and".to_string(),
        ];
        let (_, vectors) = TfIdfVectorizer::fit_transform(&documents);
        let matrix = SimilarityMatrix::from_vectors(&vectors);

        assert_eq!(matrix.dimension(), 4);
        for i in 0..4 {
            assert_eq!(matrix.get(i, i), 1.0);
            for j in 0..4 {
                assert_eq!(matrix.get(i, j), matrix.get(j, i));
                assert!((0.0..=1.0).contains(&matrix.get(i, j)));
            }
        }
        assert!(matrix.get(0, 1) > matrix.get(0, 2));
        assert_eq!(matrix.row(3), &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn empty_input_yields_empty_matrix() {
        let matrix = SimilarityMatrix::from_vectors(&[]);
        assert_eq!(matrix.dimension(), 0);
    }
}
