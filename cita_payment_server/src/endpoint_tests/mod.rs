mod helpers;
mod queries;
mod webhooks;
