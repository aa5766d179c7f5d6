use crate::story::error::ComposeError;
use crate::story::timeline::Scene;

/// A contiguous run of at most `batch_size` scenes overlaid in one ffmpeg call.
#[derive(Debug, Clone, Copy)]
pub struct CompositingBatch<'a> {
    pub index: usize,
    pub scenes: &'a [Scene],
}

pub fn split_batches(
    scenes: &[Scene],
    batch_size: usize,
) -> Result<Vec<CompositingBatch<'_>>, ComposeError> {
    if batch_size == 0 {
        return Err(ComposeError::InvalidBatchSize);
    }
    Ok(scenes
        .chunks(batch_size)
        .enumerate()
        .map(|(index, scenes)| CompositingBatch { index, scenes })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::timeline::testing::scenes_of;

    fn scenes(n: usize) -> Vec<Scene> {
        scenes_of(&vec![6.0; n])
    }

    #[test]
    fn batches_cover_scenes_in_order() {
        let scenes = scenes(12);
        let batches = split_batches(&scenes, 5).unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].scenes[0].id(), 1);
        assert_eq!(batches[1].scenes[0].id(), 6);
        assert_eq!(batches[2].scenes.last().map(Scene::id), Some(12));
        assert_eq!(batches[2].scenes.len(), 2);
        assert_eq!(batches[2].index, 2);
    }

    #[test]
    fn partial_last_batch_and_empty_input() {
        assert_eq!(split_batches(&scenes(10), 5).unwrap().len(), 2);
        assert_eq!(split_batches(&scenes(11), 5).unwrap().len(), 3);
        assert_eq!(split_batches(&scenes(1), 10).unwrap().len(), 1);
        assert!(split_batches(&[], 5).unwrap().is_empty());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(matches!(
            split_batches(&scenes(2), 0),
            Err(ComposeError::InvalidBatchSize)
        ));
    }
}
