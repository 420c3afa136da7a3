//! Classifiers used by the pipeline comparison and the benchmark.

pub mod classifier;

pub use classifier::{
    validate_training_set, Classifier, DecisionTreeClassifier, GaussianNbClassifier,
    LinearSvmClassifier, LogisticClassifier, RandomForestClassifier, TrainedClassifier,
};
