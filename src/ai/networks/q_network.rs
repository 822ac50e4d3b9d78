use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;

/// Action-value network over flat observation vectors.
///
/// ```text
/// Input:  [batch, input_size]
/// FC1:    input_size -> hidden_size, ReLU
/// FC2:    hidden_size -> hidden_size, ReLU
/// FC3:    hidden_size -> num_actions  (Q-values, one per action)
/// ```
#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    relu: Relu,
}

#[derive(Config, Debug)]
pub struct QNetworkConfig {
    pub input_size: usize,
    pub num_actions: usize,
    #[config(default = 64)]
    pub hidden_size: usize,
}

impl QNetworkConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> QNetwork<B> {
        QNetwork {
            fc1: LinearConfig::new(self.input_size, self.hidden_size).init(device),
            fc2: LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
            fc3: LinearConfig::new(self.hidden_size, self.num_actions).init(device),
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> QNetwork<B> {
    /// Forward pass: input [batch, input_size] -> output [batch, num_actions].
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.relu.forward(self.fc1.forward(input));
        let x = self.relu.forward(self.fc2.forward(x));
        self.fc3.forward(x)
    }
}
