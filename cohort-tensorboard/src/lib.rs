//! Tensorboard backend of [`Recorder`].
use cohort_core::record::{Record, RecordStorage, RecordValue, Recorder, STEP_KEY};
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
///
/// Scalars are written as scalars, 3-dimensional `[height, width, channels]`
/// arrays as images. Other values are skipped.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
    ignore_unsupported_value: bool,
    storage: RecordStorage,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: STEP_KEY.to_string(),
            ignore_unsupported_value: true,
            storage: RecordStorage::new(),
        }
    }

    /// Construct a [`TensorboardRecorder`] with checking unsupported record value.
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new_with_check_unsupported_value<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            ignore_unsupported_value: false,
            ..Self::new(logdir)
        }
    }

    fn add_image(&mut self, k: &str, data: &[f32], hwc: [usize; 3], step: usize) {
        let [h, w, c] = hwc;
        if c == 0 || data.len() != h * w * c {
            log::warn!("Skipped image {} of shape {:?} with {} values", k, hwc, data.len());
            return;
        }
        let min = data.iter().fold(f32::MAX, |m, v| v.min(m));
        let scale = (data.iter().fold(-f32::MAX, |m, v| v.max(m)) - min).max(f32::EPSILON);
        let to_u8 = |e: f32| ((e - min) / scale * 255f32) as u8;

        // HWC to CHW, grayscale broadcast to 3 channels
        let mut chw = Vec::with_capacity(3 * h * w);
        for ch in 0..3 {
            let src = if c == 1 { 0 } else { ch.min(c - 1) };
            for i in 0..h * w {
                chw.push(to_u8(data[i * c + src]));
            }
        }
        self.writer.add_image(k, chw.as_slice(), &[3, h, w], step)
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [Record] into a TFRecord.
    ///
    /// The record must carry the step under [`STEP_KEY`]; otherwise it is dropped.
    fn write(&mut self, record: Record) {
        let step = match record.get(&self.step_key) {
            Some(RecordValue::Scalar(v)) => *v as usize,
            _ => {
                log::warn!("Dropped a record without {}", self.step_key);
                return;
            }
        };

        for (k, v) in record.iter() {
            if *k != self.step_key {
                match v {
                    RecordValue::Scalar(v) => self.writer.add_scalar(k, *v as f32, step),
                    RecordValue::Array3(data, shape) => self.add_image(k, data, *shape, step),
                    _ => {
                        if !self.ignore_unsupported_value {
                            panic!("Unsupported value: {:?}", (k, v));
                        }
                    }
                };
            }
        }
    }

    fn store(&mut self, record: Record) {
        self.storage.store(record);
    }

    fn flush(&mut self, step: i64) {
        let mut record = self.storage.aggregate();
        record.insert(self.step_key.clone(), RecordValue::Scalar(step as _));
        self.write(record);
        self.writer.flush();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_write_and_flush() {
        let dir = TempDir::new("tensorboard").unwrap();
        let mut recorder = TensorboardRecorder::new(dir.path());

        let mut record = Record::from_scalar("eval_goal", 0.5);
        record.insert(STEP_KEY, RecordValue::Scalar(400.));
        record.insert("frame", RecordValue::Array3(vec![0., 255., 0., 255.], [2, 2, 1]));
        record.insert("node_visits", RecordValue::Array1(vec![1., 2.]));
        recorder.write(record);

        recorder.store(Record::from_scalar("value_loss", 1.0));
        recorder.store(Record::from_scalar("value_loss", 0.5));
        recorder.flush(800);

        // A record without a step is dropped
        recorder.write(Record::from_scalar("eval_goal", 0.5));

        let n_files = std::fs::read_dir(dir.path()).unwrap().count();
        assert!(n_files > 0);
    }
}
