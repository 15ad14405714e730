//! Rendering of deterministic episodes.
use super::Runner;
use crate::{
    base::{decompose, Policy, ThreadActions, Trainer, VecEnv},
    error::CohortError,
    record::RecordValue,
    recurrent,
    util::{check_shape, flatten_threads, info_array3, unflatten_threads},
};
use anyhow::{Context, Result};
use image::{codecs::gif::GifEncoder, Delay, Frame, Rgba, RgbaImage};
use log::info;
use ndarray::{Array3, Array4};
use std::{
    fs::{self, File},
    io::BufWriter,
    path::Path,
};

fn to_u8(v: f32) -> u8 {
    v.max(0.).min(255.) as u8
}

/// Converts an `[height, width, channels]` array of values in `[0, 255]` to a GIF frame.
///
/// Grayscale, RGB and RGBA arrays are accepted.
pub(crate) fn to_frame(data: &[f32], shape: [usize; 3], delay: Delay) -> Result<Frame, CohortError> {
    let [h, w, c] = shape;
    if !matches!(c, 1 | 3 | 4) || data.len() != h * w * c {
        return Err(CohortError::ShapeMismatch {
            name: "frame".to_string(),
            expected: vec![h, w, 3],
            actual: vec![data.len()],
        });
    }
    let img = RgbaImage::from_fn(w as u32, h as u32, |x, y| {
        let p = &data[(y as usize * w + x as usize) * c..][..c];
        match c {
            1 => {
                let g = to_u8(p[0]);
                Rgba([g, g, g, 255])
            }
            3 => Rgba([to_u8(p[0]), to_u8(p[1]), to_u8(p[2]), 255]),
            _ => Rgba([to_u8(p[0]), to_u8(p[1]), to_u8(p[2]), to_u8(p[3])]),
        }
    });
    Ok(Frame::from_parts(img, 0, 0, delay))
}

/// Writes frames to a GIF file, creating parent directories as needed.
pub(crate) fn save_gif(path: &Path, frames: Vec<Frame>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut encoder = GifEncoder::new(BufWriter::new(file));
    encoder.encode_frames(frames)?;
    Ok(())
}

impl<E: VecEnv> Runner<E> {
    /// Runs `render_episodes` deterministic episodes on the training environment.
    ///
    /// An episode lasts until every thread has finished at least once. If
    /// `save_gifs` is set, the frame of thread 0 after the reset, if the
    /// environment gives one, and its `frame` info at every step are saved to
    /// `<run_dir>/gifs/episode<i>.gif`. Returns the total reward of thread 0 in
    /// each episode.
    pub fn render<T: Trainer>(&mut self, trainer: &mut T) -> Result<Vec<f32>> {
        let n = self.config.n_rollout_threads;
        let a = self.spec.n_agents;
        let rnn_shape = [n, a, self.config.recurrent_n, self.config.hidden_size];
        let delay = Delay::from_numer_denom_ms((self.config.ifi * 1000.).round() as u32, 1);
        let mut rewards = Vec::with_capacity(self.config.render_episodes);

        for i_episode in 0..self.config.render_episodes {
            let combined = self.env.reset()?;
            let (mut obs, _, mut available_actions) = decompose(&combined, n, &self.spec)?;
            let mut rnn_states = Array4::<f32>::zeros(rnn_shape);
            let mut masks = Array3::<f32>::ones((n, a, 1));
            let mut finished = vec![false; n];
            let mut frames = vec![];
            let mut reward = 0f32;
            if self.config.save_gifs {
                if let Some(RecordValue::Array3(data, shape)) = self.env.frame(0) {
                    frames.push(to_frame(&data, shape, delay)?);
                }
            }

            while !finished.iter().all(|&f| f) {
                trainer.prep_rollout();
                let (actions, next_rnn_states) = trainer.policy().act(
                    flatten_threads(obs.view())?.view(),
                    flatten_threads(rnn_states.view())?.view(),
                    flatten_threads(masks.view())?.view(),
                    flatten_threads(available_actions.view())?.view(),
                    true,
                )?;
                let actions = unflatten_threads(actions.view(), n)?;
                check_shape("actions", &[n, a, self.spec.act_dim], actions.shape())?;
                rnn_states = unflatten_threads(next_rnn_states.view(), n)?;
                check_shape("rnn_states", &rnn_shape, rnn_states.shape())?;

                let actions: Vec<ThreadActions> =
                    actions.outer_iter().map(|x| x.to_owned()).collect();
                let res = self.env.step(&actions)?;
                res.validate(n, a)?;

                if !finished[0] {
                    reward += res.rewards.row(0).sum();
                    if self.config.save_gifs {
                        let (data, shape) = info_array3(&res.infos[0], "frame", 0)?;
                        frames.push(to_frame(&data, shape, delay)?);
                    }
                }
                for (e, &done) in res.thread_dones().iter().enumerate() {
                    finished[e] |= done;
                }

                recurrent::reset_done_states(res.dones.view(), &mut rnn_states)?;
                masks = recurrent::continuation_masks(res.dones.view());
                let (o, _, av) = decompose(&res.obs, n, &self.spec)?;
                obs = o;
                available_actions = av;
            }

            if self.config.save_gifs {
                let path = self.config.gif_dir().join(format!("episode{}.gif", i_episode));
                save_gif(&path, frames)?;
                info!("Saved {:?}", path);
            }
            info!("Rendered episode {}, reward {}", i_episode, reward);
            rewards.push(reward);
        }

        Ok(rewards)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_to_frame() {
        let delay = Delay::from_numer_denom_ms(100, 1);
        // 2x3 RGB image, red channel grows with x
        let data: Vec<f32> = (0..6)
            .flat_map(|i| vec![(i % 3) as f32 * 100., 0., 300.])
            .collect();
        let frame = to_frame(&data, [2, 3, 3], delay).unwrap();
        let img = frame.buffer();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1), &Rgba([200, 0, 255, 255]));

        assert!(to_frame(&data, [2, 3, 2], delay).is_err());
        assert!(to_frame(&data[1..], [2, 3, 3], delay).is_err());
    }

    #[test]
    fn test_save_gif() -> Result<()> {
        let dir = TempDir::new("gif")?;
        let path = dir.path().join("gifs").join("episode0.gif");
        let delay = Delay::from_numer_denom_ms(100, 1);
        let frames = (0..3)
            .map(|i| to_frame(&vec![i as f32 * 50.; 4 * 4], [4, 4, 1], delay))
            .collect::<Result<Vec<_>, _>>()?;
        save_gif(&path, frames)?;
        assert!(path.exists());
        Ok(())
    }
}
