mod kalman;
mod parameter;
