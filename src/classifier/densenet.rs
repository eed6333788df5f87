//! Reference architecture for weights-only artifacts
//!
//! DenseNet-121 backbone (no top) followed by the classification head used in
//! training: BatchNorm → global average pooling → Dense(256, ReLU) →
//! Dropout(0.5) → Dense(num_classes, softmax).
//!
//! Tensor names expected in the safetensors file:
//!
//! ```text
//! backbone.stem.conv.weight                       7x7/2, 64 filters
//! backbone.stem.bn.{weight,bias,running_mean,running_var}
//! backbone.block{1..4}.layer{i}.{bn1,conv1,bn2,conv2}
//! backbone.transition{1..3}.{bn,conv}
//! backbone.bn
//! head.bn
//! head.dense.{weight,bias}                        [256, 1024]
//! head.classifier.{weight,bias}                   [num_classes, 256]
//! ```

use candle_core::{DType, Device, Module, ModuleT, Tensor, D};
use candle_nn::{batch_norm, conv2d_no_bias, linear, BatchNorm, Conv2d, Conv2dConfig, Linear, VarBuilder};
use ndarray::Array4;

use super::{Classifier, InferenceError, InputShape};
use crate::constants::HEAD_HIDDEN_UNITS;

/// Dense layers per block in DenseNet-121
const BLOCK_LAYERS: [usize; 4] = [6, 12, 24, 16];
const GROWTH_RATE: usize = 32;
const BOTTLENECK_WIDTH: usize = 4 * GROWTH_RATE;
const STEM_FILTERS: usize = 64;

/// Keras DenseNet uses a slightly larger epsilon than the BatchNorm default.
const BACKBONE_BN_EPS: f64 = 1.001e-5;
const HEAD_BN_EPS: f64 = 1e-3;

struct DenseLayer {
    bn1: BatchNorm,
    conv1: Conv2d,
    bn2: BatchNorm,
    conv2: Conv2d,
}

impl DenseLayer {
    fn new(in_channels: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let same = Conv2dConfig { padding: 1, ..Default::default() };
        Ok(Self {
            bn1: batch_norm(in_channels, BACKBONE_BN_EPS, vb.pp("bn1"))?,
            conv1: conv2d_no_bias(in_channels, BOTTLENECK_WIDTH, 1, Default::default(), vb.pp("conv1"))?,
            bn2: batch_norm(BOTTLENECK_WIDTH, BACKBONE_BN_EPS, vb.pp("bn2"))?,
            conv2: conv2d_no_bias(BOTTLENECK_WIDTH, GROWTH_RATE, 3, same, vb.pp("conv2"))?,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let ys = self.bn1.forward_t(xs, false)?.relu()?;
        let ys = self.conv1.forward(&ys)?;
        let ys = self.bn2.forward_t(&ys, false)?.relu()?;
        let ys = self.conv2.forward(&ys)?;
        Tensor::cat(&[xs, &ys], 1)
    }
}

struct Transition {
    bn: BatchNorm,
    conv: Conv2d,
}

impl Transition {
    fn new(in_channels: usize, out_channels: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            bn: batch_norm(in_channels, BACKBONE_BN_EPS, vb.pp("bn"))?,
            conv: conv2d_no_bias(in_channels, out_channels, 1, Default::default(), vb.pp("conv"))?,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let ys = self.bn.forward_t(xs, false)?.relu()?;
        self.conv.forward(&ys)?.avg_pool2d(2)
    }
}

struct Backbone {
    stem_conv: Conv2d,
    stem_bn: BatchNorm,
    blocks: Vec<Vec<DenseLayer>>,
    transitions: Vec<Transition>,
    bn: BatchNorm,
    out_channels: usize,
}

impl Backbone {
    fn new(in_channels: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let stem = Conv2dConfig { stride: 2, ..Default::default() };
        let stem_conv = conv2d_no_bias(in_channels, STEM_FILTERS, 7, stem, vb.pp("stem.conv"))?;
        let stem_bn = batch_norm(STEM_FILTERS, BACKBONE_BN_EPS, vb.pp("stem.bn"))?;

        let mut channels = STEM_FILTERS;
        let mut blocks = Vec::with_capacity(BLOCK_LAYERS.len());
        let mut transitions = Vec::with_capacity(BLOCK_LAYERS.len() - 1);

        for (b, &layers) in BLOCK_LAYERS.iter().enumerate() {
            let block_vb = vb.pp(format!("block{}", b + 1));
            let mut block = Vec::with_capacity(layers);
            for i in 0..layers {
                block.push(DenseLayer::new(channels, block_vb.pp(format!("layer{}", i + 1)))?);
                channels += GROWTH_RATE;
            }
            blocks.push(block);

            if b + 1 < BLOCK_LAYERS.len() {
                let reduced = channels / 2;
                transitions.push(Transition::new(channels, reduced, vb.pp(format!("transition{}", b + 1)))?);
                channels = reduced;
            }
        }

        let bn = batch_norm(channels, BACKBONE_BN_EPS, vb.pp("bn"))?;

        Ok(Self { stem_conv, stem_bn, blocks, transitions, bn, out_channels: channels })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        // Keras pads explicitly before the strided stem conv and pool.
        let xs = xs.pad_with_zeros(2, 3, 3)?.pad_with_zeros(3, 3, 3)?;
        let xs = self.stem_conv.forward(&xs)?;
        let xs = self.stem_bn.forward_t(&xs, false)?.relu()?;
        let mut xs = xs
            .pad_with_zeros(2, 1, 1)?
            .pad_with_zeros(3, 1, 1)?
            .max_pool2d_with_stride(3, 2)?;

        for (b, block) in self.blocks.iter().enumerate() {
            for layer in block {
                xs = layer.forward(&xs)?;
            }
            if let Some(transition) = self.transitions.get(b) {
                xs = transition.forward(&xs)?;
            }
        }

        self.bn.forward_t(&xs, false)?.relu()
    }
}

/// DenseNet-121 plus the custom softmax head
pub struct DenseNetClassifier {
    backbone: Backbone,
    head_bn: BatchNorm,
    dense: Linear,
    classifier: Linear,
    input_shape: InputShape,
    device: Device,
}

impl DenseNetClassifier {
    /// Build the reference network and bind its weights from `vb`.
    pub fn new(input_shape: InputShape, num_classes: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let backbone = Backbone::new(input_shape.channels, vb.pp("backbone"))?;
        let features = backbone.out_channels;
        let head = vb.pp("head");

        Ok(Self {
            head_bn: batch_norm(features, HEAD_BN_EPS, head.pp("bn"))?,
            dense: linear(features, HEAD_HIDDEN_UNITS, head.pp("dense"))?,
            classifier: linear(HEAD_HIDDEN_UNITS, num_classes, head.pp("classifier"))?,
            device: vb.device().clone(),
            backbone,
            input_shape,
        })
    }

    /// Load weights from an in-memory safetensors buffer (CPU, f32).
    pub fn from_safetensors(
        buffer: Vec<u8>,
        input_shape: InputShape,
        num_classes: usize,
    ) -> candle_core::Result<Self> {
        let device = Device::Cpu;
        let vb = VarBuilder::from_buffered_safetensors(buffer, DType::F32, &device)?;
        Self::new(input_shape, num_classes, vb)
    }

    /// `[N, C, H, W]` in, `[N, num_classes]` probabilities out
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = self.backbone.forward(xs)?;
        let xs = self.head_bn.forward_t(&xs, false)?;
        let xs = xs.mean(D::Minus1)?.mean(D::Minus1)?;
        let xs = self.dense.forward(&xs)?.relu()?;
        // Dropout is the identity at inference time.
        let xs = self.classifier.forward(&xs)?;
        candle_nn::ops::softmax(&xs, D::Minus1)
    }
}

impl Classifier for DenseNetClassifier {
    fn declared_input_shape(&self) -> Option<InputShape> {
        Some(self.input_shape)
    }

    fn predict(&self, batch: Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let (n, h, w, c) = batch.dim();
        let data: Vec<f32> = batch.iter().copied().collect();

        let run = || -> candle_core::Result<Vec<f32>> {
            let xs = Tensor::from_vec(data, (n, h, w, c), &self.device)?
                .permute((0, 3, 1, 2))?
                .contiguous()?;
            self.forward(&xs)?.flatten_all()?.to_vec1::<f32>()
        };

        run().map_err(|e| InferenceError(format!("Inference failed: {}", e)))
    }

    fn backend(&self) -> &'static str {
        "candle"
    }
}
